// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Serialize;
use thiserror::Error;
use warden_store::{AllocatorError, StoreError};

/// Why an add was rejected. Detected before any write; the document is left
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
	#[error("a peer with this name already exists")]
	DuplicateName,

	#[error("a peer with this public key already exists")]
	DuplicateKey,

	#[error("this address is already assigned")]
	DuplicateAddress,

	#[error("address is outside the allocation pool or reserved")]
	AddressOutOfPool,
}

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("invalid peer name: {0}")]
	InvalidName(String),

	#[error("conflict: {0}")]
	Conflict(ConflictReason),

	#[error("no peer named {0:?}")]
	NotFound(String),

	#[error(transparent)]
	PoolExhausted(#[from] AllocatorError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
