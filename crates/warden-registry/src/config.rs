// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use ipnet::Ipv4Net;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid {var}: {message}")]
	Parse { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
	/// Path of the annotated interface document.
	pub document_path: PathBuf,
	/// Name of the live tunnel interface.
	pub interface: String,
	/// When false, mutations persist but reconciliation is skipped.
	pub sync_enabled: bool,
	/// Public endpoint clients dial, e.g. `vpn.example.com:51820`.
	pub server_endpoint: Option<String>,
	/// Pool used when the document does not exist yet. Host form: the
	/// address is the interface's own, the prefix defines the pool.
	pub fallback_pool: Ipv4Net,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			document_path: PathBuf::from("/etc/wireguard/wg0.conf"),
			interface: "wg0".to_string(),
			sync_enabled: false,
			server_endpoint: None,
			fallback_pool: "10.8.0.1/24".parse().unwrap(),
		}
	}
}

impl RegistryConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		let defaults = Self::default();

		let document_path = std::env::var("WARDEN_WG_CONFIG")
			.map(PathBuf::from)
			.unwrap_or(defaults.document_path);

		let interface = std::env::var("WARDEN_WG_INTERFACE").unwrap_or(defaults.interface);

		let sync_enabled = std::env::var("WARDEN_ENABLE_SYNC")
			.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
			.unwrap_or(defaults.sync_enabled);

		let server_endpoint = std::env::var("WARDEN_SERVER_ENDPOINT")
			.ok()
			.filter(|v| !v.trim().is_empty());

		let fallback_pool = match std::env::var("WARDEN_POOL") {
			Ok(v) => v.parse().map_err(|e| ConfigError::Parse {
				var: "WARDEN_POOL".to_string(),
				message: format!("{e}"),
			})?,
			Err(_) => defaults.fallback_pool,
		};

		Ok(Self {
			document_path,
			interface,
			sync_enabled,
			server_endpoint,
			fallback_pool,
		})
	}
}
