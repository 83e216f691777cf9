// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocatorError {
	#[error("address pool {0} is exhausted")]
	Exhausted(Ipv4Net),
}

/// Returns the numerically lowest usable address in `pool` that is neither
/// the interface's own address nor already allocated.
///
/// Deterministic and side-effect-free: allocation is advisory, and the same
/// inputs always yield the same answer. `Ipv4Net::hosts` walks the pool in
/// ascending order and already excludes the network and broadcast addresses.
pub fn next_free(
	pool: Ipv4Net,
	interface: Ipv4Addr,
	allocated: &HashSet<Ipv4Addr>,
) -> Result<Ipv4Addr, AllocatorError> {
	pool.hosts()
		.find(|addr| *addr != interface && !allocated.contains(addr))
		.ok_or(AllocatorError::Exhausted(pool))
}

/// Whether `addr` is assignable to a peer: strictly inside the pool and not
/// one of the reserved addresses (network, broadcast, interface-self).
pub fn is_assignable(pool: Ipv4Net, interface: Ipv4Addr, addr: Ipv4Addr) -> bool {
	pool.contains(&addr)
		&& addr != pool.network()
		&& addr != pool.broadcast()
		&& addr != interface
}
