//! Media storage module for the Tumble fulfillment system.
//!
//! This module handles storage of step-evidence photos. Objects are
//! content-addressed: the reference handed back to the workflow is the
//! SHA3-256 digest of the image bytes, so a retry after a failed step
//! write re-resolves to the same reference instead of corrupting state or
//! duplicating the object.

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};
use tumble_types::{ConfigSchema, ImplementationRegistry, PhotoRef};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod disk;
	pub mod memory;
}

/// Errors that can occur during media storage operations.
#[derive(Debug, Error)]
pub enum MediaError {
	/// Error that occurs when a requested object is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when an upload carries no bytes.
	#[error("Empty image upload")]
	EmptyUpload,
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for media backends.
///
/// Backends store opaque blobs keyed by their content digest. They never
/// compute digests themselves; the service layer owns addressing.
#[async_trait]
pub trait MediaInterface: Send + Sync {
	/// Stores the given bytes under the digest key.
	async fn put_bytes(&self, digest: &str, bytes: &[u8]) -> Result<(), MediaError>;

	/// Retrieves the bytes stored under the digest key.
	async fn get_bytes(&self, digest: &str) -> Result<Vec<u8>, MediaError>;

	/// Checks whether an object exists for the digest key.
	async fn exists(&self, digest: &str) -> Result<bool, MediaError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for media factory functions.
pub type MediaFactory = fn(&toml::Value) -> Result<Box<dyn MediaInterface>, MediaError>;

/// Registry trait for media implementations.
pub trait MediaRegistry: ImplementationRegistry<Factory = MediaFactory> {}

/// Get all registered media implementations.
pub fn get_all_implementations() -> Vec<(&'static str, MediaFactory)> {
	use implementations::{disk, memory};

	vec![
		(disk::Registry::NAME, disk::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level media service providing content-addressed photo storage.
pub struct MediaService {
	/// The underlying media backend implementation.
	backend: Box<dyn MediaInterface>,
}

impl MediaService {
	/// Creates a new MediaService with the specified backend.
	pub fn new(backend: Box<dyn MediaInterface>) -> Self {
		Self { backend }
	}

	/// Computes the content digest for a photo.
	pub fn digest(bytes: &[u8]) -> String {
		hex::encode(Sha3_256::digest(bytes))
	}

	/// Stores a photo and returns its content-addressed reference.
	///
	/// When the digest is already present the write is skipped; uploading
	/// the same photo twice is a no-op that yields the identical
	/// reference.
	pub async fn store_photo(&self, bytes: &[u8]) -> Result<PhotoRef, MediaError> {
		if bytes.is_empty() {
			return Err(MediaError::EmptyUpload);
		}

		let digest = Self::digest(bytes);
		if !self.backend.exists(&digest).await? {
			self.backend.put_bytes(&digest, bytes).await?;
		}

		Ok(PhotoRef {
			digest,
			size_bytes: bytes.len() as u64,
		})
	}

	/// Retrieves the bytes behind a photo reference.
	pub async fn fetch_photo(&self, photo: &PhotoRef) -> Result<Vec<u8>, MediaError> {
		self.backend.get_bytes(&photo.digest).await
	}

	/// Checks whether the referenced photo is stored.
	pub async fn contains(&self, photo: &PhotoRef) -> Result<bool, MediaError> {
		self.backend.exists(&photo.digest).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryMedia;

	#[tokio::test]
	async fn test_store_is_content_addressed() {
		let media = MediaService::new(Box::new(MemoryMedia::new()));

		let first = media.store_photo(b"bag photo").await.unwrap();
		let second = media.store_photo(b"bag photo").await.unwrap();
		assert_eq!(first, second);

		let other = media.store_photo(b"handoff photo").await.unwrap();
		assert_ne!(first.digest, other.digest);

		assert_eq!(media.fetch_photo(&first).await.unwrap(), b"bag photo");
	}

	#[tokio::test]
	async fn test_empty_upload_rejected() {
		let media = MediaService::new(Box::new(MemoryMedia::new()));
		assert!(matches!(
			media.store_photo(b"").await,
			Err(MediaError::EmptyUpload)
		));
	}
}
