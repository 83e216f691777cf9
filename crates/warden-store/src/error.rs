// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("document not found: {0}")]
	NotFound(PathBuf),

	#[error("failed to access document: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid interface section: {0}")]
	Interface(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
