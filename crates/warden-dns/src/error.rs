// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DnsError>;

#[derive(Debug, Error)]
pub enum DnsError {
	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: std::net::SocketAddr,
		#[source]
		source: std::io::Error,
	},

	#[error("socket error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid configuration for {name}: {reason}")]
	InvalidConfig { name: String, reason: String },
}
