// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collaborator interface to the `wg`/`wg-quick` tooling.
//!
//! Everything the registry needs from the live runtime sits behind
//! [`WgRuntime`] so tests can substitute a mock and the reconciliation
//! engine stays the single owner of the kernel peer table.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("failed to spawn `{command}`: {source}")]
	Spawn {
		command: String,
		source: std::io::Error,
	},

	#[error("`{command}` exited with {status}: {stderr}")]
	Failed {
		command: String,
		status: std::process::ExitStatus,
		stderr: String,
	},
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Live session telemetry for one peer, keyed by public key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeerTelemetry {
	pub endpoint: Option<String>,
	pub latest_handshake: Option<DateTime<Utc>>,
	pub transfer_rx: u64,
	pub transfer_tx: u64,
}

#[async_trait]
pub trait WgRuntime: Send + Sync {
	/// Session telemetry keyed by peer public key. Keys the runtime has
	/// never seen are simply absent.
	async fn telemetry(&self, interface: &str) -> RuntimeResult<HashMap<String, PeerTelemetry>>;

	/// The interface's own public key.
	async fn public_key(&self, interface: &str) -> RuntimeResult<String>;

	/// Peer-only view of the on-disk document, produced by the external
	/// diff-producer from the file as written (never from memory).
	async fn strip(&self, interface: &str) -> RuntimeResult<String>;

	/// Hands the stripped view to the external diff-applier, which updates
	/// only the delta and leaves unaffected sessions alone.
	async fn sync(&self, interface: &str, stripped: &Path) -> RuntimeResult<()>;
}

/// [`WgRuntime`] backed by the `wg` and `wg-quick` binaries.
#[derive(Debug, Default)]
pub struct CommandWgRuntime;

impl CommandWgRuntime {
	pub fn new() -> Self {
		Self
	}
}

async fn run(program: &str, args: &[&str]) -> RuntimeResult<String> {
	let command = format!("{program} {}", args.join(" "));
	trace!(%command, "running");

	let output = Command::new(program)
		.args(args)
		.output()
		.await
		.map_err(|source| RuntimeError::Spawn {
			command: command.clone(),
			source,
		})?;

	if !output.status.success() {
		return Err(RuntimeError::Failed {
			command,
			status: output.status,
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}

	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl WgRuntime for CommandWgRuntime {
	async fn telemetry(&self, interface: &str) -> RuntimeResult<HashMap<String, PeerTelemetry>> {
		let output = run("wg", &["show", interface, "dump"]).await?;
		Ok(parse_dump(&output))
	}

	async fn public_key(&self, interface: &str) -> RuntimeResult<String> {
		let output = run("wg", &["show", interface, "public-key"]).await?;
		Ok(output.trim().to_string())
	}

	async fn strip(&self, interface: &str) -> RuntimeResult<String> {
		run("wg-quick", &["strip", interface]).await
	}

	async fn sync(&self, interface: &str, stripped: &Path) -> RuntimeResult<()> {
		let path = stripped.to_string_lossy();
		run("wg", &["syncconf", interface, path.as_ref()]).await?;
		Ok(())
	}
}

/// Parses `wg show <iface> dump`: tab-separated, first line is the interface
/// itself, then one line per peer with public key, preshared key, endpoint,
/// allowed ips, latest handshake (epoch seconds, 0 = never), rx, tx,
/// keepalive.
fn parse_dump(output: &str) -> HashMap<String, PeerTelemetry> {
	let mut telemetry = HashMap::new();

	for line in output.lines().skip(1) {
		let fields: Vec<&str> = line.split('\t').collect();
		if fields.len() < 8 {
			continue;
		}

		let latest_handshake = fields[4]
			.parse::<i64>()
			.ok()
			.filter(|secs| *secs != 0)
			.and_then(|secs| Utc.timestamp_opt(secs, 0).single());

		telemetry.insert(
			fields[0].to_string(),
			PeerTelemetry {
				endpoint: (fields[2] != "(none)").then(|| fields[2].to_string()),
				latest_handshake,
				transfer_rx: fields[5].parse().unwrap_or(0),
				transfer_tx: fields[6].parse().unwrap_or(0),
			},
		);
	}

	telemetry
}
