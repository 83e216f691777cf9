// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Name resolution for tunnel peers.
//!
//! Registered peers become resolvable as `<name>.<suffix>` A records over
//! plain UDP, answered straight from the peer document. There is no zone
//! file and no cache: the document is the zone.

pub mod config;
pub mod error;
pub mod index;
pub mod server;

pub use config::ResolverConfig;
pub use error::{DnsError, Result};
pub use index::NameIndex;
pub use server::{DnsServer, NameResolver};
