// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::codec;
use crate::error::{Result, StoreError};
use crate::record::Document;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Handle to the on-disk document. The file is externally owned: every
/// operation re-reads it in full rather than caching a copy that could go
/// stale relative to out-of-band edits.
#[derive(Debug, Clone)]
pub struct DocumentFile {
	path: PathBuf,
}

impl DocumentFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub async fn exists(&self) -> bool {
		fs::metadata(&self.path).await.is_ok()
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn load(&self) -> Result<Document> {
		let text = fs::read_to_string(&self.path).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				StoreError::NotFound(self.path.clone())
			} else {
				StoreError::Io(e)
			}
		})?;
		codec::parse(&text)
	}

	/// Overwrites the whole file atomically: serialize to a sibling temp
	/// file in the same directory, then rename over the target. Readers
	/// never observe a half-written document.
	#[instrument(skip(self, doc), fields(path = %self.path.display()))]
	pub async fn store(&self, doc: &Document) -> Result<()> {
		let text = codec::serialize(doc);

		let file_name = self.path.file_name().ok_or_else(|| {
			StoreError::Io(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				format!("document path has no file name: {}", self.path.display()),
			))
		})?;
		let tmp = self
			.path
			.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

		fs::write(&tmp, &text).await?;
		fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::PeerRecord;
	use chrono::NaiveDate;
	use tempfile::TempDir;

	const SAMPLE: &str = "\
[Interface]
Address = 10.8.0.1/24
ListenPort = 51820

# ==========================================
# ClientName: macbook
# AddedAt: 2026-01-27
# ==========================================
[Peer]
PublicKey = MACBOOK_KEY
AllowedIPs = 10.8.0.5/32
";

	async fn seeded(dir: &TempDir) -> DocumentFile {
		let path = dir.path().join("wg0.conf");
		fs::write(&path, SAMPLE).await.unwrap();
		DocumentFile::new(path)
	}

	#[tokio::test]
	async fn load_parses_the_file() {
		let dir = TempDir::new().unwrap();
		let file = seeded(&dir).await;

		let doc = file.load().await.unwrap();
		assert_eq!(doc.peers().count(), 1);
		assert_eq!(doc.peer("macbook").unwrap().public_key, "MACBOOK_KEY");
	}

	#[tokio::test]
	async fn load_missing_file_is_not_found() {
		let dir = TempDir::new().unwrap();
		let file = DocumentFile::new(dir.path().join("absent.conf"));

		let err = file.load().await.unwrap_err();
		assert!(matches!(err, StoreError::NotFound(_)));
	}

	#[tokio::test]
	async fn store_rewrites_atomically() {
		let dir = TempDir::new().unwrap();
		let file = seeded(&dir).await;

		let mut doc = file.load().await.unwrap();
		doc.push_peer(PeerRecord {
			name: "phone".to_string(),
			public_key: "PHONE_KEY".to_string(),
			preshared_key: None,
			allowed_address: "10.8.0.6/32".parse().unwrap(),
			endpoint: None,
			added_at: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
		});
		file.store(&doc).await.unwrap();

		// No temp file left behind.
		let mut entries = fs::read_dir(dir.path()).await.unwrap();
		let mut names = Vec::new();
		while let Some(entry) = entries.next_entry().await.unwrap() {
			names.push(entry.file_name().to_string_lossy().into_owned());
		}
		assert_eq!(names, vec!["wg0.conf".to_string()]);

		let reloaded = file.load().await.unwrap();
		assert_eq!(reloaded.peers().count(), 2);
		assert!(reloaded.peer("phone").is_some());
	}

	#[tokio::test]
	async fn store_then_load_round_trips_unrelated_regions() {
		let dir = TempDir::new().unwrap();
		let file = seeded(&dir).await;

		let doc = file.load().await.unwrap();
		file.store(&doc).await.unwrap();

		let text = fs::read_to_string(file.path()).await.unwrap();
		assert_eq!(text, SAMPLE);
	}
}
