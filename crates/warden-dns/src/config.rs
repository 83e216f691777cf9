// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::{DnsError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Resolver configuration, read from `WARDEN_DNS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
	/// UDP listen address, typically the tunnel-side interface address.
	pub listen: SocketAddr,
	/// Domain suffix that peer names are resolved under.
	pub domain_suffix: String,
	/// The peer document answering resolution queries.
	pub document_path: PathBuf,
	/// TTL advertised on answers. Short, since registrations change at runtime.
	pub ttl: u32,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([10, 8, 0, 1], 53)),
			domain_suffix: ".vpn.example.com".to_string(),
			document_path: PathBuf::from("/etc/wireguard/wg0.conf"),
			ttl: 60,
		}
	}
}

impl ResolverConfig {
	pub fn from_env() -> Result<Self> {
		let mut config = Self::default();

		if let Ok(listen) = std::env::var("WARDEN_DNS_LISTEN") {
			config.listen = listen.parse().map_err(|_| DnsError::InvalidConfig {
				name: "WARDEN_DNS_LISTEN".to_string(),
				reason: format!("not a socket address: {listen}"),
			})?;
		}
		if let Ok(suffix) = std::env::var("WARDEN_DNS_SUFFIX") {
			config.domain_suffix = suffix;
		}
		if let Ok(path) = std::env::var("WARDEN_WG_CONFIG") {
			config.document_path = PathBuf::from(path);
		}

		Ok(config)
	}
}
