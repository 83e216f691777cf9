// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::NaiveDate;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// The `[Interface]` preamble of the document. Set once at bootstrap and
/// rarely mutated; this crate only ever rewrites peer blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSettings {
	/// Local address with prefix, e.g. `10.8.0.1/24`.
	pub address: Ipv4Net,
	#[serde(default)]
	pub listen_port: Option<u16>,
	#[serde(default)]
	pub private_key: Option<String>,
	#[serde(default)]
	pub pre_up: Option<String>,
	#[serde(default)]
	pub post_up: Option<String>,
	#[serde(default)]
	pub post_down: Option<String>,
}

impl InterfaceSettings {
	/// The allocation pool, derived from the interface address prefix.
	pub fn pool(&self) -> Ipv4Net {
		self.address.trunc()
	}

	/// The interface's own address, reserved in the pool.
	pub fn host(&self) -> Ipv4Addr {
		self.address.addr()
	}
}

/// One registered remote party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
	pub name: String,
	pub public_key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preshared_key: Option<String>,
	/// Host address with prefix, a `/32` singleton inside the pool.
	pub allowed_address: Ipv4Net,
	/// Present for fixed/reachable nodes, absent for roaming peers.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	/// Informational only, never used for logic.
	pub added_at: NaiveDate,
}

impl PeerRecord {
	pub fn address(&self) -> Ipv4Addr {
		self.allowed_address.addr()
	}

	/// Peers with a fixed endpoint are eligible for direct-connect initiation.
	pub fn is_p2p_candidate(&self) -> bool {
		self.endpoint.is_some()
	}
}

/// A well-formed peer block together with its exact on-disk text.
#[derive(Debug, Clone)]
pub struct PeerBlock {
	pub record: PeerRecord,
	/// Byte-exact source for this block, including the metadata header and
	/// the blank separator lines preceding it. `None` for blocks added in
	/// memory; the codec renders those canonically when serializing.
	pub raw: Option<String>,
}

/// A block whose metadata header failed to parse. Surfaced by position but
/// preserved verbatim so operations on other peers keep working.
#[derive(Debug, Clone, Serialize)]
pub struct MalformedBlock {
	/// 1-based line number of the block's header delimiter.
	pub line: usize,
	pub reason: String,
	#[serde(skip)]
	pub raw: String,
}

#[derive(Debug, Clone)]
pub enum Block {
	Peer(PeerBlock),
	Malformed(MalformedBlock),
}

/// The parsed document: one interface preamble plus an ordered sequence of
/// peer blocks. Order is append-order and is preserved across rewrites.
#[derive(Debug, Clone)]
pub struct Document {
	pub interface: InterfaceSettings,
	pub(crate) preamble: String,
	pub blocks: Vec<Block>,
}

impl Document {
	pub fn peers(&self) -> impl Iterator<Item = &PeerRecord> {
		self.blocks.iter().filter_map(|b| match b {
			Block::Peer(p) => Some(&p.record),
			Block::Malformed(_) => None,
		})
	}

	pub fn peer(&self, name: &str) -> Option<&PeerRecord> {
		self.peers().find(|p| p.name == name)
	}

	pub fn issues(&self) -> impl Iterator<Item = &MalformedBlock> {
		self.blocks.iter().filter_map(|b| match b {
			Block::Malformed(m) => Some(m),
			Block::Peer(_) => None,
		})
	}

	/// Addresses currently assigned, including the interface's own.
	pub fn allocated(&self) -> HashSet<Ipv4Addr> {
		let mut used: HashSet<Ipv4Addr> = self.peers().map(|p| p.address()).collect();
		used.insert(self.interface.host());
		used
	}

	/// Appends a new peer. The block is rendered canonically at serialize
	/// time; existing blocks are untouched.
	pub fn push_peer(&mut self, record: PeerRecord) {
		self.blocks.push(Block::Peer(PeerBlock { record, raw: None }));
	}

	/// Removes the named peer block, header included. Returns the removed
	/// record, or `None` when no such name exists.
	pub fn remove_peer(&mut self, name: &str) -> Option<PeerRecord> {
		let idx = self.blocks.iter().position(|b| match b {
			Block::Peer(p) => p.record.name == name,
			Block::Malformed(_) => false,
		})?;
		match self.blocks.remove(idx) {
			Block::Peer(p) => Some(p.record),
			Block::Malformed(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(name: &str, addr: &str, endpoint: Option<&str>) -> PeerRecord {
		PeerRecord {
			name: name.to_string(),
			public_key: format!("{name}-key"),
			preshared_key: None,
			allowed_address: addr.parse().unwrap(),
			endpoint: endpoint.map(String::from),
			added_at: NaiveDate::from_ymd_opt(2026, 1, 27).unwrap(),
		}
	}

	#[test]
	fn interface_pool_and_host() {
		let iface = InterfaceSettings {
			address: "10.8.0.1/24".parse().unwrap(),
			listen_port: Some(51820),
			private_key: None,
			pre_up: None,
			post_up: None,
			post_down: None,
		};
		assert_eq!(iface.pool(), "10.8.0.0/24".parse::<Ipv4Net>().unwrap());
		assert_eq!(iface.host(), "10.8.0.1".parse::<Ipv4Addr>().unwrap());
	}

	#[test]
	fn p2p_candidacy_follows_endpoint() {
		assert!(!record("roaming", "10.8.0.5/32", None).is_p2p_candidate());
		assert!(record("fixed", "10.8.0.6/32", Some("nas.example.com:51820")).is_p2p_candidate());
	}

	#[test]
	fn remove_peer_returns_none_for_unknown_name() {
		let mut doc = Document {
			interface: InterfaceSettings {
				address: "10.8.0.1/24".parse().unwrap(),
				listen_port: None,
				private_key: None,
				pre_up: None,
				post_up: None,
				post_down: None,
			},
			preamble: String::new(),
			blocks: vec![],
		};
		doc.push_peer(record("macbook", "10.8.0.5/32", None));
		assert!(doc.remove_peer("nonexistent").is_none());
		assert!(doc.remove_peer("macbook").is_some());
		assert_eq!(doc.peers().count(), 0);
	}
}
