// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Minimal authoritative UDP resolver for tunnel peer names.
//!
//! Serves only A queries under the configured suffix. Every lookup reads the
//! document fresh, so a registration is resolvable immediately after it is
//! persisted with no propagation step. Unparseable packets are dropped; every
//! parseable query gets exactly one response.

use crate::config::ResolverConfig;
use crate::error::{DnsError, Result};
use crate::index::NameIndex;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;
use tracing::{debug, info, instrument, warn};
use warden_store::{DocumentFile, StoreError};

pub struct NameResolver {
	file: DocumentFile,
	/// Lowercase, with a leading dot. `macbook.vpn.example.com` splits into
	/// host `macbook` and this suffix.
	suffix: String,
	ttl: u32,
}

enum Lookup {
	Found(Ipv4Addr),
	NoSuchName,
	Failed(StoreError),
}

impl NameResolver {
	pub fn new(config: &ResolverConfig) -> Self {
		let mut suffix = config.domain_suffix.to_lowercase();
		if !suffix.starts_with('.') {
			suffix.insert(0, '.');
		}
		Self {
			file: DocumentFile::new(&config.document_path),
			suffix,
			ttl: config.ttl,
		}
	}

	/// Answers one wire-format query. Returns `None` for packets that do not
	/// parse as a DNS message; those are dropped without a response.
	pub async fn handle(&self, packet: &[u8]) -> Option<Vec<u8>> {
		let request = Message::from_vec(packet).ok()?;
		let query = request.queries().first()?.clone();

		let mut response = Message::new();
		response
			.set_id(request.id())
			.set_message_type(MessageType::Response)
			.set_op_code(OpCode::Query)
			.set_recursion_desired(request.recursion_desired())
			.set_authoritative(true)
			.add_query(query.clone());

		if query.query_type() != RecordType::A {
			debug!(qtype = %query.query_type(), "refusing non-A query");
			response.set_response_code(ResponseCode::NotImp);
			return response.to_vec().ok();
		}

		let qname = query.name().to_utf8();
		match self.lookup(&qname).await {
			Lookup::Found(addr) => {
				debug!(name = %qname, %addr, "resolved");
				response.set_response_code(ResponseCode::NoError);
				response.add_answer(Record::from_rdata(
					query.name().clone(),
					self.ttl,
					RData::A(addr.into()),
				));
			}
			Lookup::NoSuchName => {
				debug!(name = %qname, "no such name");
				response.set_response_code(ResponseCode::NXDomain);
			}
			Lookup::Failed(e) => {
				warn!(name = %qname, error = %e, "document unreadable, answering SERVFAIL");
				response.set_response_code(ResponseCode::ServFail);
			}
		}

		response.to_vec().ok()
	}

	async fn lookup(&self, qname: &str) -> Lookup {
		let qname = qname.trim_end_matches('.').to_lowercase();
		let host = match qname.strip_suffix(&self.suffix) {
			Some(host) if !host.is_empty() => host,
			_ => return Lookup::NoSuchName,
		};

		let doc = match self.file.load().await {
			Ok(doc) => doc,
			// An interface that is not provisioned yet has no names.
			Err(StoreError::NotFound(_)) => return Lookup::NoSuchName,
			Err(e) => return Lookup::Failed(e),
		};

		match NameIndex::from_document(&doc).resolve(host) {
			Some(addr) => Lookup::Found(addr),
			None => Lookup::NoSuchName,
		}
	}
}

pub struct DnsServer {
	config: ResolverConfig,
	resolver: NameResolver,
}

impl DnsServer {
	pub fn new(config: ResolverConfig) -> Self {
		let resolver = NameResolver::new(&config);
		Self { config, resolver }
	}

	/// Binds the UDP socket and serves queries until the task is cancelled.
	#[instrument(skip(self), fields(listen = %self.config.listen))]
	pub async fn run(&self) -> Result<()> {
		let socket = UdpSocket::bind(self.config.listen)
			.await
			.map_err(|source| DnsError::Bind {
				addr: self.config.listen,
				source,
			})?;
		info!(suffix = %self.config.domain_suffix, "name resolver listening");

		// Queries fit in a classic unextended DNS datagram.
		let mut buf = [0u8; 512];
		loop {
			let (len, peer) = match socket.recv_from(&mut buf).await {
				Ok(received) => received,
				Err(e) => {
					warn!(error = %e, "receive failed");
					continue;
				}
			};

			if let Some(response) = self.resolver.handle(&buf[..len]).await {
				if let Err(e) = socket.send_to(&response, peer).await {
					warn!(error = %e, %peer, "failed to send response");
				}
			}
		}
	}
}
