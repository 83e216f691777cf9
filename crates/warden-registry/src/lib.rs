// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer registry and reconciliation engine for a single WireGuard interface.
//!
//! The registry exposes add/remove/list/query operations over the annotated
//! document managed by `warden-store`, enforcing name/key/address uniqueness
//! before any write. After a successful persist it converges the live
//! interface via the external strip/sync protocol without severing sessions
//! of unaffected peers.
//!
//! Mutations and the strip/sync pair form one critical section behind a
//! process-wide lock; read operations share a consistent snapshot.

pub mod config;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod runtime;
pub mod template;

pub use config::{ConfigError, RegistryConfig};
pub use error::{ConflictReason, RegistryError, Result};
pub use reconcile::{ReconcileError, ReconcileStatus, Reconciler};
pub use registry::{AddedPeer, NewPeer, PeerRegistry, PeerStatus, PeerTemplate, RemovedPeer};
pub use runtime::{CommandWgRuntime, PeerTelemetry, RuntimeError, WgRuntime};
