// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer configuration store for a single WireGuard interface.
//!
//! The on-disk `wg0.conf` is the database of record. Peers are delimited by a
//! comment metadata header (client name and creation date) immediately above
//! their `[Peer]` section. This crate parses that file into a [`Document`],
//! serializes it back losslessly for every region it does not own, and
//! computes free addresses in the tunnel pool.
//!
//! The codec never reformats content it does not understand: unknown
//! directives, stray comments and whitespace round-trip byte-for-byte.

pub mod allocator;
pub mod codec;
pub mod error;
pub mod file;
pub mod record;

pub use allocator::{next_free, AllocatorError};
pub use codec::{parse, serialize};
pub use error::{Result, StoreError};
pub use file::DocumentFile;
pub use record::{Block, Document, InterfaceSettings, MalformedBlock, PeerBlock, PeerRecord};
