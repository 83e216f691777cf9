// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fill-in-the-blank client configuration. Key material is generated on the
//! client device only; the placeholders mark exactly what the user supplies.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

pub const PUBLIC_KEY_PLACEHOLDER: &str = "<SERVER_PUBLIC_KEY>";
pub const ENDPOINT_PLACEHOLDER: &str =
	"<server endpoint not configured - set WARDEN_SERVER_ENDPOINT>";

pub fn render_client_config(
	server_public_key: &str,
	server_endpoint: &str,
	address: Ipv4Addr,
	pool: Ipv4Net,
) -> String {
	format!(
		"[Interface]
# === fill in the private key generated on your device ===
PrivateKey = <YOUR_PRIVATE_KEY>
Address = {address}/{prefix}

[Peer]
PublicKey = {server_public_key}
# === fill in if you generated a preshared key ===
# PresharedKey = <YOUR_PRESHARED_KEY>
Endpoint = {server_endpoint}
AllowedIPs = {pool}
PersistentKeepalive = 25
",
		prefix = pool.prefix_len(),
	)
}

pub fn key_instructions(address: Ipv4Addr) -> String {
	format!(
		"**[Key generation]**
The server reserved `{address}` for this device. Generate keys locally:
1. Key pair: `wg genkey | tee private.key | wg pubkey > public.key`
2. Preshared key (optional): `wg genpsk > preshared.key`

Submit only `public.key` and `preshared.key`. Never share `private.key`.",
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn template_contains_placeholders_and_assignment() {
		let rendered = render_client_config(
			"SERVER_PUBLIC_KEY",
			"vpn.example.com:51820",
			"10.8.0.10".parse().unwrap(),
			"10.8.0.0/24".parse().unwrap(),
		);

		assert!(rendered.contains("SERVER_PUBLIC_KEY"));
		assert!(rendered.contains("vpn.example.com:51820"));
		assert!(rendered.contains("Address = 10.8.0.10/24"));
		assert!(rendered.contains("AllowedIPs = 10.8.0.0/24"));
		assert!(rendered.contains("<YOUR_PRIVATE_KEY>"));
		assert!(rendered.contains("PersistentKeepalive = 25"));
	}

	#[test]
	fn instructions_name_the_reserved_address() {
		let instructions = key_instructions("10.8.0.4".parse().unwrap());
		assert!(instructions.contains("10.8.0.4"));
		assert!(instructions.contains("wg genkey"));
	}
}
