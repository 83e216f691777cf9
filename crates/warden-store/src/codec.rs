// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lossless codec for the annotated interface document.
//!
//! Two grammars overlay the file: the directive grammar (`Key = Value` lines
//! inside `[Interface]`/`[Peer]` sections) and the metadata header grammar (a
//! delimiter line, `# ClientName:`, `# AddedAt:`, a second delimiter). Any
//! line matching neither is opaque content and round-trips byte-for-byte.

use crate::error::{Result, StoreError};
use crate::record::{Block, Document, InterfaceSettings, MalformedBlock, PeerBlock, PeerRecord};
use chrono::NaiveDate;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Delimiter emitted for system-written headers. Parsing accepts any `# =+`
/// run so externally edited files stay recognizable.
const HEADER_RULE: &str = "# ==========================================";
const NAME_TAG: &str = "# ClientName:";
const DATE_TAG: &str = "# AddedAt:";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn logical(line: &str) -> &str {
	line.trim_end_matches(|c| c == '\r' || c == '\n')
}

fn is_delimiter(line: &str) -> bool {
	match line.strip_prefix("# ") {
		Some(rest) => {
			let rest = rest.trim_end();
			!rest.is_empty() && rest.bytes().all(|b| b == b'=')
		}
		None => false,
	}
}

fn is_blank(line: &str) -> bool {
	line.trim().is_empty()
}

/// Splits the text into the interface preamble and peer blocks.
///
/// A block with an unparseable header or missing required directives becomes
/// a [`MalformedBlock`], reported by line number; the rest of the document
/// parses normally.
pub fn parse(text: &str) -> Result<Document> {
	let lines: Vec<&str> = text.split_inclusive('\n').collect();
	let mut offsets = Vec::with_capacity(lines.len());
	let mut pos = 0;
	for line in &lines {
		offsets.push(pos);
		pos += line.len();
	}

	// A delimiter line alone does not anchor a block; the next line must
	// carry a metadata tag. This keeps decorative comment rules inside a
	// block where they belong.
	let mut starts = Vec::new();
	for i in 0..lines.len() {
		if !is_delimiter(logical(lines[i])) {
			continue;
		}
		let Some(next) = lines.get(i + 1) else {
			continue;
		};
		let next = logical(next);
		if next.starts_with(NAME_TAG) || next.starts_with(DATE_TAG) {
			starts.push(i);
		}
	}

	// Blank separator lines bind to the block that follows them, so removing
	// a block also removes its separator and the rewrite stays byte-exact.
	let bounds: Vec<(usize, usize)> = starts
		.iter()
		.map(|&s| {
			let mut a = s;
			while a > 0 && is_blank(lines[a - 1]) {
				a -= 1;
			}
			(a, s)
		})
		.collect();

	let preamble_end = bounds.first().map(|&(a, _)| offsets[a]).unwrap_or(text.len());
	let preamble = text[..preamble_end].to_string();
	let interface = parse_interface(&preamble)?;

	let mut blocks = Vec::with_capacity(bounds.len());
	for (idx, &(a, s)) in bounds.iter().enumerate() {
		let body_end = bounds.get(idx + 1).map(|&(na, _)| na).unwrap_or(lines.len());
		let byte_end = bounds
			.get(idx + 1)
			.map(|&(na, _)| offsets[na])
			.unwrap_or(text.len());
		let raw = text[offsets[a]..byte_end].to_string();

		match parse_block(&lines, s, body_end) {
			Ok(record) => blocks.push(Block::Peer(PeerBlock {
				record,
				raw: Some(raw),
			})),
			Err(reason) => blocks.push(Block::Malformed(MalformedBlock {
				line: s + 1,
				reason,
				raw,
			})),
		}
	}

	Ok(Document {
		interface,
		preamble,
		blocks,
	})
}

fn parse_block(lines: &[&str], start: usize, end: usize) -> std::result::Result<PeerRecord, String> {
	let name = lines
		.get(start + 1)
		.map(|l| logical(l))
		.and_then(|l| l.strip_prefix(NAME_TAG))
		.ok_or_else(|| "missing ClientName header line".to_string())?
		.trim();
	if name.is_empty() {
		return Err("empty ClientName".to_string());
	}

	let date = lines
		.get(start + 2)
		.map(|l| logical(l))
		.and_then(|l| l.strip_prefix(DATE_TAG))
		.ok_or_else(|| "missing AddedAt header line".to_string())?
		.trim();
	let added_at = NaiveDate::parse_from_str(date, DATE_FORMAT)
		.map_err(|e| format!("invalid AddedAt date {date:?}: {e}"))?;

	let closing = lines.get(start + 3).map(|l| logical(l)).unwrap_or("");
	if !is_delimiter(closing) {
		return Err("unterminated metadata header".to_string());
	}

	let mut public_key = None;
	let mut preshared_key = None;
	let mut allowed = None;
	let mut endpoint = None;

	for line in lines.iter().take(end).skip(start + 4) {
		let line = logical(line);
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
			continue;
		}
		// Directive separator is the first '='; key material on the value
		// side may itself end in '='.
		let Some((key, value)) = line.split_once('=') else {
			continue;
		};
		let value = value.trim();
		match key.trim() {
			"PublicKey" => public_key = public_key.or_else(|| Some(value.to_string())),
			"PresharedKey" => preshared_key = preshared_key.or_else(|| Some(value.to_string())),
			"AllowedIPs" => allowed = allowed.or_else(|| Some(value.to_string())),
			"Endpoint" => endpoint = endpoint.or_else(|| Some(value.to_string())),
			// Unrecognized directives are preserved verbatim through raw.
			_ => {}
		}
	}

	let public_key = public_key.ok_or_else(|| "missing PublicKey directive".to_string())?;
	let allowed = allowed.ok_or_else(|| "missing AllowedIPs directive".to_string())?;
	let allowed_address = parse_host_net(&allowed)?;

	Ok(PeerRecord {
		name: name.to_string(),
		public_key,
		preshared_key,
		allowed_address,
		endpoint,
		added_at,
	})
}

fn parse_host_net(s: &str) -> std::result::Result<Ipv4Net, String> {
	if s.contains('/') {
		s.parse()
			.map_err(|e| format!("invalid AllowedIPs {s:?}: {e}"))
	} else {
		let addr: Ipv4Addr = s
			.parse()
			.map_err(|e| format!("invalid AllowedIPs {s:?}: {e}"))?;
		Ipv4Net::new(addr, 32).map_err(|e| format!("invalid AllowedIPs {s:?}: {e}"))
	}
}

fn parse_interface(preamble: &str) -> Result<InterfaceSettings> {
	let mut in_interface = false;
	let mut address = None;
	let mut listen_port = None;
	let mut private_key = None;
	let mut pre_up = None;
	let mut post_up = None;
	let mut post_down = None;

	for line in preamble.lines() {
		let line = line.trim();
		if line.starts_with('[') {
			in_interface = line.eq_ignore_ascii_case("[interface]");
			continue;
		}
		if !in_interface || line.is_empty() || line.starts_with('#') {
			continue;
		}
		let Some((key, value)) = line.split_once('=') else {
			continue;
		};
		let value = value.trim();
		match key.trim() {
			"Address" => address = Some(value.to_string()),
			"ListenPort" => listen_port = value.parse().ok(),
			"PrivateKey" => private_key = Some(value.to_string()),
			"PreUp" => pre_up = Some(value.to_string()),
			"PostUp" => post_up = Some(value.to_string()),
			"PostDown" => post_down = Some(value.to_string()),
			_ => {}
		}
	}

	let address = address.ok_or_else(|| {
		StoreError::Interface("missing Address in [Interface] section".to_string())
	})?;
	// The prefix defines the allocation pool, so a bare address is not enough.
	let first = address.split(',').next().unwrap_or(&address).trim();
	let address: Ipv4Net = first
		.parse()
		.map_err(|e| StoreError::Interface(format!("invalid Address {first:?}: {e}")))?;

	Ok(InterfaceSettings {
		address,
		listen_port,
		private_key,
		pre_up,
		post_up,
		post_down,
	})
}

/// Inverse of [`parse`] for unmodified regions; peers added in memory are
/// appended at the end in canonical form.
pub fn serialize(doc: &Document) -> String {
	let mut out = String::with_capacity(doc.preamble.len() + 256 * doc.blocks.len());
	out.push_str(&doc.preamble);

	let mut appended = Vec::new();
	for block in &doc.blocks {
		match block {
			Block::Peer(PeerBlock { raw: Some(raw), .. }) => out.push_str(raw),
			Block::Peer(PeerBlock { record, raw: None }) => appended.push(record),
			Block::Malformed(m) => out.push_str(&m.raw),
		}
	}

	for record in appended {
		let keep = out.trim_end().len();
		out.truncate(keep);
		out.push('\n');
		out.push_str(&peer_block_text(record));
		out.push('\n');
	}

	out
}

/// Canonical header + directive block for a peer, starting with its blank
/// separator line.
pub fn peer_block_text(record: &PeerRecord) -> String {
	let mut lines = vec![
		String::new(),
		HEADER_RULE.to_string(),
		format!("{NAME_TAG} {}", record.name),
		format!("{DATE_TAG} {}", record.added_at.format(DATE_FORMAT)),
		HEADER_RULE.to_string(),
		"[Peer]".to_string(),
		format!("PublicKey = {}", record.public_key),
		format!("AllowedIPs = {}", record.allowed_address),
	];
	if let Some(psk) = &record.preshared_key {
		lines.push(format!("PresharedKey = {psk}"));
	}
	if let Some(endpoint) = &record.endpoint {
		lines.push(format!("Endpoint = {endpoint}"));
	}
	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "\
[Interface]
PrivateKey = SERVER_PRIVATE_KEY
Address = 10.8.0.1/24
ListenPort = 51820
PostUp = iptables -A FORWARD -i wg0 -j ACCEPT
PostDown = iptables -D FORWARD -i wg0 -j ACCEPT

# ==========================================
# ClientName: macbook-pro
# AddedAt: 2026-01-27
# ==========================================
[Peer]
PublicKey = CLIENT1_PUBLIC_KEY
AllowedIPs = 10.8.0.5/32

# ==========================================
# ClientName: home-nas
# AddedAt: 2026-01-27
# ==========================================
[Peer]
PublicKey = CLIENT2_PUBLIC_KEY
AllowedIPs = 10.8.0.6/32
Endpoint = nas.myhome.com:51820

# ==========================================
# ClientName: phone-android
# AddedAt: 2026-01-28
# ==========================================
[Peer]
PublicKey = CLIENT3_PUBLIC_KEY
AllowedIPs = 10.8.0.7/32
PresharedKey = PRESHARED_KEY_VALUE
";

	fn new_record(name: &str, key: &str, addr: &str) -> PeerRecord {
		PeerRecord {
			name: name.to_string(),
			public_key: key.to_string(),
			preshared_key: None,
			allowed_address: addr.parse().unwrap(),
			endpoint: None,
			added_at: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
		}
	}

	#[test]
	fn parses_interface_settings() {
		let doc = parse(SAMPLE).unwrap();
		assert_eq!(doc.interface.address, "10.8.0.1/24".parse::<Ipv4Net>().unwrap());
		assert_eq!(doc.interface.listen_port, Some(51820));
		assert_eq!(doc.interface.private_key.as_deref(), Some("SERVER_PRIVATE_KEY"));
		assert!(doc.interface.post_up.as_deref().unwrap().contains("iptables -A"));
		assert!(doc.interface.post_down.as_deref().unwrap().contains("iptables -D"));
	}

	#[test]
	fn parses_all_peer_blocks() {
		let doc = parse(SAMPLE).unwrap();
		let peers: Vec<_> = doc.peers().collect();
		assert_eq!(peers.len(), 3);

		assert_eq!(peers[0].name, "macbook-pro");
		assert_eq!(peers[0].public_key, "CLIENT1_PUBLIC_KEY");
		assert_eq!(peers[0].allowed_address.to_string(), "10.8.0.5/32");
		assert_eq!(peers[0].added_at, NaiveDate::from_ymd_opt(2026, 1, 27).unwrap());
		assert!(peers[0].endpoint.is_none());
		assert!(peers[0].preshared_key.is_none());

		assert_eq!(peers[1].endpoint.as_deref(), Some("nas.myhome.com:51820"));
		assert_eq!(peers[2].preshared_key.as_deref(), Some("PRESHARED_KEY_VALUE"));
		assert_eq!(peers[2].added_at, NaiveDate::from_ymd_opt(2026, 1, 28).unwrap());
	}

	#[test]
	fn round_trip_is_byte_identical() {
		let doc = parse(SAMPLE).unwrap();
		assert_eq!(serialize(&doc), SAMPLE);
	}

	#[test]
	fn add_then_remove_restores_original_bytes() {
		let mut doc = parse(SAMPLE).unwrap();
		doc.push_peer(new_record("new-device", "NEW_PUBLIC_KEY", "10.8.0.10/32"));
		let with_peer = serialize(&doc);
		assert_ne!(with_peer, SAMPLE);

		let mut doc = parse(&with_peer).unwrap();
		assert!(doc.remove_peer("new-device").is_some());
		assert_eq!(serialize(&doc), SAMPLE);
	}

	#[test]
	fn appended_peer_is_canonical_and_reparseable() {
		let mut doc = parse(SAMPLE).unwrap();
		let mut record = new_record("office-pc", "OFFICE_KEY", "10.8.0.9/32");
		record.preshared_key = Some("OFFICE_PSK".to_string());
		record.endpoint = Some("office.example.com:51820".to_string());
		doc.push_peer(record.clone());

		let text = serialize(&doc);
		assert!(text.contains("# ClientName: office-pc"));
		assert!(text.contains("# AddedAt: 2026-01-28"));
		assert!(text.contains("PresharedKey = OFFICE_PSK"));
		assert!(text.contains("Endpoint = office.example.com:51820"));
		assert!(text.ends_with('\n'));

		let reparsed = parse(&text).unwrap();
		assert_eq!(reparsed.peer("office-pc"), Some(&record));
		// Reserializing the reparsed document must be stable.
		assert_eq!(serialize(&reparsed), text);
	}

	#[test]
	fn removing_a_middle_peer_leaves_neighbors_untouched() {
		let mut doc = parse(SAMPLE).unwrap();
		assert!(doc.remove_peer("home-nas").is_some());
		let text = serialize(&doc);

		assert!(!text.contains("home-nas"));
		assert!(!text.contains("CLIENT2_PUBLIC_KEY"));
		// No double blank lines left behind by the excised separator.
		assert!(!text.contains("\n\n\n"));
		assert!(text.contains("# ClientName: macbook-pro"));
		assert!(text.contains("# ClientName: phone-android"));

		let reparsed = parse(&text).unwrap();
		assert_eq!(reparsed.peers().count(), 2);
		assert_eq!(serialize(&reparsed), text);
	}

	#[test]
	fn malformed_header_is_isolated_and_reported_by_position() {
		let corrupted = SAMPLE.replace("# AddedAt: 2026-01-27\n# ==========================================\n[Peer]\nPublicKey = CLIENT2_PUBLIC_KEY", "# AddedAt: not-a-date\n# ==========================================\n[Peer]\nPublicKey = CLIENT2_PUBLIC_KEY");
		let doc = parse(&corrupted).unwrap();

		let peers: Vec<_> = doc.peers().collect();
		assert_eq!(peers.len(), 2);
		assert_eq!(peers[0].name, "macbook-pro");
		assert_eq!(peers[1].name, "phone-android");

		let issues: Vec<_> = doc.issues().collect();
		assert_eq!(issues.len(), 1);
		assert!(issues[0].reason.contains("AddedAt"));
		assert_eq!(issues[0].line, 16);

		// The broken block still round-trips verbatim.
		assert_eq!(serialize(&doc), corrupted);
	}

	#[test]
	fn missing_public_key_is_a_block_level_error() {
		let corrupted = SAMPLE.replace("PublicKey = CLIENT3_PUBLIC_KEY\n", "");
		let doc = parse(&corrupted).unwrap();
		assert_eq!(doc.peers().count(), 2);
		let issue = doc.issues().next().unwrap();
		assert!(issue.reason.contains("PublicKey"));
		assert_eq!(serialize(&doc), corrupted);
	}

	#[test]
	fn unknown_directives_are_preserved_verbatim() {
		let extended = SAMPLE.replace(
			"AllowedIPs = 10.8.0.5/32\n",
			"AllowedIPs = 10.8.0.5/32\nPersistentKeepalive = 25\nFutureKey = future-value\n",
		);
		let doc = parse(&extended).unwrap();
		assert_eq!(doc.peers().count(), 3);
		assert_eq!(serialize(&doc), extended);
	}

	#[test]
	fn decorative_comment_rules_do_not_split_blocks() {
		let decorated = SAMPLE.replace(
			"PresharedKey = PRESHARED_KEY_VALUE\n",
			"PresharedKey = PRESHARED_KEY_VALUE\n# ======\n# just a note\n",
		);
		let doc = parse(&decorated).unwrap();
		assert_eq!(doc.peers().count(), 3);
		assert_eq!(doc.issues().count(), 0);
		assert_eq!(serialize(&doc), decorated);
	}

	#[test]
	fn document_without_peers_parses_cleanly() {
		let text = "[Interface]\nAddress = 10.8.0.1/24\nListenPort = 51820\n";
		let doc = parse(text).unwrap();
		assert_eq!(doc.peers().count(), 0);
		assert_eq!(serialize(&doc), text);
	}

	#[test]
	fn missing_interface_address_is_fatal() {
		let err = parse("[Interface]\nListenPort = 51820\n").unwrap_err();
		assert!(matches!(err, StoreError::Interface(_)));
	}
}
