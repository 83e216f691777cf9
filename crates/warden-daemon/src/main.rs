// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `wardend` - WireGuard peer registry and tunnel name resolver.
//!
//! `wardend serve` runs the UDP resolver against the live peer document.
//! The remaining subcommands are one-shot administrative operations on the
//! same document, printed as JSON for scripting.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_dns::{DnsServer, ResolverConfig};
use warden_registry::{CommandWgRuntime, NewPeer, PeerRegistry, RegistryConfig, WgRuntime};

#[derive(Parser)]
#[command(name = "wardend", version, about = "WireGuard peer registry and name resolver")]
struct Cli {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
	/// Run the tunnel name resolver until interrupted
	Serve,
	/// List registered peers with live session telemetry
	List,
	/// List peers with a fixed endpoint, eligible for direct connections
	Candidates,
	/// Register a peer and converge the live interface
	Add {
		/// Device name, unique across the registry
		#[arg(long)]
		name: String,
		/// Public key generated on the device
		#[arg(long)]
		public_key: String,
		/// Tunnel address; defaults to the lowest free address in the pool
		#[arg(long)]
		address: Option<Ipv4Addr>,
		/// Fixed endpoint for directly reachable devices
		#[arg(long)]
		endpoint: Option<String>,
		/// Optional preshared key
		#[arg(long)]
		preshared_key: Option<String>,
	},
	/// Remove a peer by name
	Remove { name: String },
	/// Render a fill-in client config for the next free address
	Template,
	/// Force one reconciliation cycle against the document
	Resync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();
	let config = RegistryConfig::from_env().context("registry configuration")?;
	let sync_enabled = config.sync_enabled;
	let runtime: Arc<dyn WgRuntime> = Arc::new(CommandWgRuntime::new());
	let registry = Arc::new(PeerRegistry::new(config, runtime));

	match cli.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(registry, sync_enabled).await,
		Command::List => print_json(&registry.list().await?),
		Command::Candidates => print_json(&registry.p2p_candidates().await?),
		Command::Add {
			name,
			public_key,
			address,
			endpoint,
			preshared_key,
		} => {
			let allowed_address = match address {
				Some(address) => address,
				None => registry.template().await?.next_address,
			};
			let added = registry
				.add(NewPeer {
					name,
					public_key,
					allowed_address,
					endpoint,
					preshared_key,
				})
				.await?;
			print_json(&added)
		}
		Command::Remove { name } => print_json(&registry.remove(&name).await?),
		Command::Template => {
			let template = registry.template().await?;
			println!("{}", template.rendered);
			eprintln!("{}", template.instructions);
			Ok(())
		}
		Command::Resync => {
			registry.resync().await.context("reconciliation")?;
			info!("live interface converged with document");
			Ok(())
		}
	}
}

async fn serve(registry: Arc<PeerRegistry>, sync_enabled: bool) -> anyhow::Result<()> {
	// Surface document problems at startup instead of on the first query.
	match registry.list().await {
		Ok(peers) => info!(peers = peers.len(), "registry loaded"),
		Err(e) => warn!(error = %e, "registry not readable yet, serving anyway"),
	}
	if sync_enabled {
		if let Err(e) = registry.resync().await {
			warn!(error = %e, "initial reconciliation failed, document remains authoritative");
		}
	}

	let dns = DnsServer::new(ResolverConfig::from_env().context("resolver configuration")?);
	tokio::select! {
		result = dns.run() => result.context("name resolver"),
		_ = tokio::signal::ctrl_c() => {
			info!("shutting down");
			Ok(())
		}
	}
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
