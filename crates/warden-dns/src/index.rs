// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::net::Ipv4Addr;
use warden_store::Document;

/// Names that always resolve to the interface's own tunnel address,
/// regardless of any peer carrying the same name.
pub const RESERVED_NAMES: [&str; 2] = ["server", "gateway"];

/// Case-insensitive peer-name lookup table, derived from one document
/// snapshot. Rebuilt per query; never cached across documents.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
	entries: HashMap<String, Ipv4Addr>,
}

impl NameIndex {
	pub fn from_document(doc: &Document) -> Self {
		let mut entries = HashMap::new();
		for peer in doc.peers() {
			entries.insert(peer.name.to_lowercase(), peer.address());
		}
		// Reserved aliases win over peers that claimed the same name.
		let host = doc.interface.host();
		for name in RESERVED_NAMES {
			entries.insert(name.to_string(), host);
		}
		Self { entries }
	}

	pub fn resolve(&self, host: &str) -> Option<Ipv4Addr> {
		self.entries.get(&host.to_lowercase()).copied()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "\
[Interface]
Address = 10.8.0.1/24

# ==========================================
# ClientName: MacBook-Pro
# AddedAt: 2026-01-27
# ==========================================
[Peer]
PublicKey = CLIENT1_PUBLIC_KEY
AllowedIPs = 10.8.0.5/32
";

	#[test]
	fn resolution_is_case_insensitive() {
		let doc = warden_store::parse(SAMPLE).unwrap();
		let index = NameIndex::from_document(&doc);

		let expected: Ipv4Addr = "10.8.0.5".parse().unwrap();
		assert_eq!(index.resolve("macbook-pro"), Some(expected));
		assert_eq!(index.resolve("MACBOOK-PRO"), Some(expected));
		assert_eq!(index.resolve("macbook"), None);
	}

	#[test]
	fn reserved_names_resolve_to_the_interface_address() {
		let doc = warden_store::parse(SAMPLE).unwrap();
		let index = NameIndex::from_document(&doc);

		let host: Ipv4Addr = "10.8.0.1".parse().unwrap();
		assert_eq!(index.resolve("server"), Some(host));
		assert_eq!(index.resolve("Gateway"), Some(host));
	}

	#[test]
	fn a_peer_cannot_shadow_a_reserved_name() {
		let text = SAMPLE.replace("MacBook-Pro", "server");
		let doc = warden_store::parse(&text).unwrap();
		let index = NameIndex::from_document(&doc);

		assert_eq!(index.resolve("server"), Some("10.8.0.1".parse().unwrap()));
	}
}
