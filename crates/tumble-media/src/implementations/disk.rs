//! Disk-backed media backend.
//!
//! Stores one file per digest under a configured root directory, written
//! atomically via a temp file and rename. Because objects are immutable
//! once written there is no locking; a concurrent re-upload of the same
//! digest writes identical bytes.

use crate::{MediaError, MediaFactory, MediaInterface};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;

/// Disk-backed media implementation.
pub struct DiskMedia {
	/// Root directory for stored objects.
	root: PathBuf,
}

impl DiskMedia {
	/// Creates a new DiskMedia rooted at the given directory.
	pub fn new(root: PathBuf) -> Self {
		Self { root }
	}

	fn object_path(&self, digest: &str) -> PathBuf {
		// Digests are hex strings, already filesystem-safe
		self.root.join(format!("{}.img", digest))
	}
}

#[async_trait]
impl MediaInterface for DiskMedia {
	async fn put_bytes(&self, digest: &str, bytes: &[u8]) -> Result<(), MediaError> {
		let path = self.object_path(digest);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| MediaError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| MediaError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| MediaError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn get_bytes(&self, digest: &str) -> Result<Vec<u8>, MediaError> {
		match fs::read(self.object_path(digest)).await {
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound),
			Err(e) => Err(MediaError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, digest: &str) -> Result<bool, MediaError> {
		Ok(self.object_path(digest).exists())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DiskMediaSchema)
	}
}

/// Configuration schema for DiskMedia.
pub struct DiskMediaSchema;

impl ConfigSchema for DiskMediaSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![Field::new("media_path", FieldType::String)]);
		schema.validate(config)
	}
}

/// Registry entry for the disk media backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "disk";
	type Factory = MediaFactory;

	fn factory() -> Self::Factory {
		create_media
	}
}

impl crate::MediaRegistry for Registry {}

/// Factory function to create a disk media backend from configuration.
///
/// Configuration parameters:
/// - `media_path`: Root directory for stored photos (default: "./data/media")
pub fn create_media(config: &toml::Value) -> Result<Box<dyn MediaInterface>, MediaError> {
	let media_path = config
		.get("media_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/media")
		.to_string();

	Ok(Box::new(DiskMedia::new(PathBuf::from(media_path))))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let media = DiskMedia::new(dir.path().to_path_buf());

		media.put_bytes("abc123", b"photo bytes").await.unwrap();
		assert!(media.exists("abc123").await.unwrap());
		assert_eq!(media.get_bytes("abc123").await.unwrap(), b"photo bytes");

		assert!(!media.exists("missing").await.unwrap());
		assert!(matches!(
			media.get_bytes("missing").await,
			Err(MediaError::NotFound)
		));
	}
}
