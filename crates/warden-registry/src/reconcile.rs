// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Converges the live interface with the just-persisted document.
//!
//! Two-step external protocol: the diff-producer strips the document down to
//! its peer directives, then the diff-applier updates only the delta against
//! the kernel peer table. Running the pair twice with no intervening
//! document change is a no-op, so a failed attempt is always safe to retry.

use crate::runtime::{RuntimeError, WgRuntime};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("strip failed: {0}")]
	Strip(#[source] RuntimeError),

	#[error("sync failed: {0}")]
	Sync(#[source] RuntimeError),

	#[error("failed to stage stripped config: {0}")]
	Io(#[from] std::io::Error),
}

/// Outcome of a reconciliation attempt. Returned alongside mutation results
/// so callers can tell "data durable" apart from "live state converged".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconcileStatus {
	/// The live interface matches the document.
	Converged,
	/// Reconciliation is disabled by configuration.
	Skipped,
	/// The document is durable but the live interface has not converged
	/// yet; a later attempt converges idempotently.
	Pending { error: String },
}

pub struct Reconciler {
	runtime: Arc<dyn WgRuntime>,
	interface: String,
	enabled: bool,
}

impl Reconciler {
	pub fn new(runtime: Arc<dyn WgRuntime>, interface: impl Into<String>, enabled: bool) -> Self {
		Self {
			runtime,
			interface: interface.into(),
			enabled,
		}
	}

	/// Best-effort convergence after a persist. Failure is reported, never
	/// propagated: the document is already the source of truth.
	#[instrument(skip(self), fields(interface = %self.interface))]
	pub async fn converge(&self) -> ReconcileStatus {
		if !self.enabled {
			debug!("reconciliation disabled, skipping");
			return ReconcileStatus::Skipped;
		}

		match self.run().await {
			Ok(()) => {
				info!("live interface converged with document");
				ReconcileStatus::Converged
			}
			Err(e) => {
				warn!(error = %e, "reconciliation failed; document remains authoritative");
				ReconcileStatus::Pending {
					error: e.to_string(),
				}
			}
		}
	}

	/// One strip/sync cycle against the file as written. Used directly for
	/// explicit re-sync, where the caller wants the hard error.
	#[instrument(skip(self), fields(interface = %self.interface))]
	pub async fn run(&self) -> Result<(), ReconcileError> {
		let stripped = self
			.runtime
			.strip(&self.interface)
			.await
			.map_err(ReconcileError::Strip)?;

		let staged = std::env::temp_dir().join(format!("{}.strip", self.interface));
		tokio::fs::write(&staged, &stripped).await?;

		let result = self
			.runtime
			.sync(&self.interface, &staged)
			.await
			.map_err(ReconcileError::Sync);

		let _ = tokio::fs::remove_file(&staged).await;
		result
	}
}
