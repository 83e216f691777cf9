// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::config::RegistryConfig;
use crate::error::{ConflictReason, RegistryError, Result};
use crate::reconcile::{ReconcileError, ReconcileStatus, Reconciler};
use crate::runtime::WgRuntime;
use crate::template;
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use warden_store::{allocator, DocumentFile, PeerRecord, StoreError};

/// Caller-proposed peer. The address is advisory: callers usually take the
/// allocator's suggestion from [`PeerRegistry::template`] but may propose
/// their own.
#[derive(Debug, Clone)]
pub struct NewPeer {
	pub name: String,
	pub public_key: String,
	pub allowed_address: Ipv4Addr,
	pub endpoint: Option<String>,
	pub preshared_key: Option<String>,
}

/// A registered peer merged with live session telemetry. Peers the runtime
/// has never seen report `None` for every telemetry field.
#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
	#[serde(flatten)]
	pub record: PeerRecord,
	pub latest_handshake: Option<DateTime<Utc>>,
	pub transfer_rx: Option<u64>,
	pub transfer_tx: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AddedPeer {
	pub record: PeerRecord,
	pub reconcile: ReconcileStatus,
}

#[derive(Debug, Serialize)]
pub struct RemovedPeer {
	pub name: String,
	pub reconcile: ReconcileStatus,
}

#[derive(Debug, Serialize)]
pub struct PeerTemplate {
	pub next_address: Ipv4Addr,
	pub server_public_key: String,
	pub server_endpoint: String,
	pub rendered: String,
	pub instructions: String,
}

/// The peer registry. All mutations plus their reconciliation run under one
/// process-wide exclusive lock; reads share a consistent snapshot.
pub struct PeerRegistry {
	file: DocumentFile,
	runtime: Arc<dyn WgRuntime>,
	reconciler: Reconciler,
	config: RegistryConfig,
	lock: RwLock<()>,
}

impl PeerRegistry {
	pub fn new(config: RegistryConfig, runtime: Arc<dyn WgRuntime>) -> Self {
		let reconciler = Reconciler::new(
			Arc::clone(&runtime),
			config.interface.clone(),
			config.sync_enabled,
		);
		Self {
			file: DocumentFile::new(&config.document_path),
			runtime,
			reconciler,
			config,
			lock: RwLock::new(()),
		}
	}

	/// All registered peers with live status. A missing document reports an
	/// empty registry; an unreachable runtime degrades to document-only
	/// data rather than failing the listing.
	#[instrument(skip(self))]
	pub async fn list(&self) -> Result<Vec<PeerStatus>> {
		let _guard = self.lock.read().await;

		let doc = match self.file.load().await {
			Ok(doc) => doc,
			Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let telemetry = match self.runtime.telemetry(&self.config.interface).await {
			Ok(telemetry) => telemetry,
			Err(e) => {
				warn!(error = %e, "runtime telemetry unavailable, listing document data only");
				HashMap::new()
			}
		};

		Ok(doc
			.peers()
			.cloned()
			.map(|record| {
				let live = telemetry.get(&record.public_key);
				PeerStatus {
					latest_handshake: live.and_then(|t| t.latest_handshake),
					transfer_rx: live.map(|t| t.transfer_rx),
					transfer_tx: live.map(|t| t.transfer_tx),
					record,
				}
			})
			.collect())
	}

	/// Peers with a fixed endpoint, eligible as direct-connect targets.
	#[instrument(skip(self))]
	pub async fn p2p_candidates(&self) -> Result<Vec<PeerRecord>> {
		let _guard = self.lock.read().await;

		let doc = match self.file.load().await {
			Ok(doc) => doc,
			Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		Ok(doc
			.peers()
			.filter(|p| p.is_p2p_candidate())
			.cloned()
			.collect())
	}

	/// Registers a peer. Uniqueness of name, public key and address plus
	/// pool membership are validated before any write; on violation the
	/// document is untouched and a specific [`ConflictReason`] is returned.
	///
	/// When reconciliation fails the add is still durably recorded; the
	/// returned [`ReconcileStatus`] says so and a retry converges.
	#[instrument(skip(self, new), fields(name = %new.name))]
	pub async fn add(&self, new: NewPeer) -> Result<AddedPeer> {
		let _guard = self.lock.write().await;

		validate_name(&new.name)?;

		let mut doc = self.file.load().await?;
		let pool = doc.interface.pool();
		let host = doc.interface.host();

		for peer in doc.peers() {
			if peer.name == new.name {
				return Err(RegistryError::Conflict(ConflictReason::DuplicateName));
			}
			if peer.public_key == new.public_key {
				return Err(RegistryError::Conflict(ConflictReason::DuplicateKey));
			}
			if peer.address() == new.allowed_address {
				return Err(RegistryError::Conflict(ConflictReason::DuplicateAddress));
			}
		}

		if !allocator::is_assignable(pool, host, new.allowed_address) {
			return Err(RegistryError::Conflict(ConflictReason::AddressOutOfPool));
		}

		let allowed_address = Ipv4Net::new(new.allowed_address, 32)
			.map_err(|_| RegistryError::Conflict(ConflictReason::AddressOutOfPool))?;

		let record = PeerRecord {
			name: new.name,
			public_key: new.public_key,
			preshared_key: new.preshared_key,
			allowed_address,
			endpoint: new.endpoint,
			added_at: Utc::now().date_naive(),
		};

		doc.push_peer(record.clone());
		self.file.store(&doc).await?;
		info!(name = %record.name, address = %record.allowed_address, "peer added");

		let reconcile = self.reconciler.converge().await;
		Ok(AddedPeer { record, reconcile })
	}

	/// Removes the named peer, header and block. An unknown name is a
	/// reported error, not a silent success, and leaves the document
	/// byte-identical.
	#[instrument(skip(self))]
	pub async fn remove(&self, name: &str) -> Result<RemovedPeer> {
		let _guard = self.lock.write().await;

		let mut doc = self.file.load().await?;
		doc.remove_peer(name)
			.ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

		self.file.store(&doc).await?;
		info!(name, "peer removed");

		let reconcile = self.reconciler.converge().await;
		Ok(RemovedPeer {
			name: name.to_string(),
			reconcile,
		})
	}

	/// Read-only: computes the next free address and renders a
	/// fill-in-the-blank config for a prospective peer. Causes no mutation.
	#[instrument(skip(self))]
	pub async fn template(&self) -> Result<PeerTemplate> {
		let _guard = self.lock.read().await;

		let (pool, host, allocated) = match self.file.load().await {
			Ok(doc) => (doc.interface.pool(), doc.interface.host(), doc.allocated()),
			Err(StoreError::NotFound(_)) => {
				let pool = self.config.fallback_pool;
				let host = pool.addr();
				(pool.trunc(), host, [host].into_iter().collect())
			}
			Err(e) => return Err(e.into()),
		};

		let next_address = allocator::next_free(pool, host, &allocated)?;

		let server_public_key = match self.runtime.public_key(&self.config.interface).await {
			Ok(key) => key,
			Err(e) => {
				warn!(error = %e, "runtime unavailable, using public key placeholder");
				template::PUBLIC_KEY_PLACEHOLDER.to_string()
			}
		};

		let server_endpoint = self
			.config
			.server_endpoint
			.clone()
			.unwrap_or_else(|| template::ENDPOINT_PLACEHOLDER.to_string());

		let rendered =
			template::render_client_config(&server_public_key, &server_endpoint, next_address, pool);
		let instructions = template::key_instructions(next_address);

		Ok(PeerTemplate {
			next_address,
			server_public_key,
			server_endpoint,
			rendered,
			instructions,
		})
	}

	/// Explicit re-sync of the live interface from the document, for
	/// retrying after a reported [`ReconcileStatus::Pending`]. Runs under
	/// the exclusive lock and bypasses the sync-enabled gate.
	#[instrument(skip(self))]
	pub async fn resync(&self) -> std::result::Result<(), ReconcileError> {
		let _guard = self.lock.write().await;
		self.reconciler.run().await
	}
}

fn validate_name(name: &str) -> Result<()> {
	if name.is_empty() {
		return Err(RegistryError::InvalidName("name is empty".to_string()));
	}
	if name.trim() != name {
		return Err(RegistryError::InvalidName(
			"name has leading or trailing whitespace".to_string(),
		));
	}
	if name.chars().any(|c| c.is_control()) {
		return Err(RegistryError::InvalidName(
			"name contains control characters".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_validation_rejects_header_breakers() {
		assert!(validate_name("macbook-pro").is_ok());
		assert!(validate_name("Office PC").is_ok());
		assert!(validate_name("").is_err());
		assert!(validate_name(" padded ").is_err());
		assert!(validate_name("two\nlines").is_err());
	}
}
