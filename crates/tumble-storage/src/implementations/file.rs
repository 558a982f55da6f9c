//! File-based storage backend for the fulfillment service.
//!
//! This module stores each record as a binary file on the filesystem,
//! providing simple persistence without external dependencies. Files
//! carry a fixed-size header with TTL information for automatic
//! expiration, and conditional writes are serialized through an exclusive
//! advisory lock on the store directory.

use crate::{StorageError, StorageFactory, StorageInterface};
use async_trait::async_trait;
use fs2::FileExt;
use tumble_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageTable, ValidationError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Fixed-size file header for TTL support.
///
/// Binary layout (32 bytes total):
/// - bytes 0-3: magic "TMBL"
/// - bytes 4-5: version (u16, little-endian)
/// - bytes 6-13: expiration timestamp (u64, little-endian, unix seconds, 0 = never)
/// - bytes 14-31: reserved
#[derive(Debug, Clone)]
struct FileHeader {
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"TMBL";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	/// Creates a new header with the given TTL.
	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0 // Permanent storage
		} else {
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.unwrap_or_default()
				.as_secs()
				.saturating_add(ttl.as_secs())
		};

		Self { expires_at }
	}

	/// Serializes the header to bytes.
	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	/// Deserializes a header from bytes.
	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	/// Checks if the data has expired.
	fn is_expired(&self) -> bool {
		if self.expires_at == 0 {
			return false; // Permanent storage
		}

		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs();

		now >= self.expires_at
	}
}

/// TTL configuration for different storage tables.
#[derive(Debug, Clone)]
pub struct TtlConfig {
	ttls: HashMap<StorageTable, Duration>,
}

impl TtlConfig {
	/// Creates TTL config from TOML configuration.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_table in StorageTable::all() {
				let config_key = format!("ttl_{}", storage_table.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.map(|v| v as u64)
				{
					ttls.insert(storage_table, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	/// Gets the TTL for a specific storage table.
	fn get_ttl(&self, storage_table: StorageTable) -> Duration {
		self.ttls
			.get(&storage_table)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for different storage tables.
	ttl_config: TtlConfig,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path and
	/// TTL config.
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		// Sanitize key to be filesystem-safe
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// Gets the TTL for a given key based on its table prefix.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		// Parse table from key (e.g., "orders:123" -> "orders")
		let table = key.split(':').next().unwrap_or("");

		table
			.parse::<StorageTable>()
			.map(|t| self.ttl_config.get_ttl(t))
			.unwrap_or(Duration::ZERO)
	}

	/// Extracts the live payload from raw file bytes, treating expired
	/// records as absent.
	fn live_payload(data: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
		let header = FileHeader::deserialize(data)?;
		if header.is_expired() {
			return Ok(None);
		}
		Ok(Some(data[FileHeader::SIZE..].to_vec()))
	}

	/// Removes all expired files from storage.
	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = fs::read_dir(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			match fs::read(&path).await {
				Ok(data) => {
					if let Ok(header) = FileHeader::deserialize(&data) {
						if header.is_expired() {
							if let Err(e) = fs::remove_file(&path).await {
								tracing::warn!("Failed to remove expired file {:?}: {}", path, e);
							} else {
								removed += 1;
							}
						}
					}
				}
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
				}
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			}
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		Self::live_payload(&data)?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Determine TTL: use provided TTL, or get from config based on key
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));

		let header = FileHeader::new(ttl);
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		Ok(path.exists())
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		let base_path = self.base_path.clone();
		let ttl = self.get_ttl_for_key(key);
		let expected = expected.map(|e| e.to_vec());

		// The read-compare-write sequence holds an exclusive advisory lock
		// on the store directory; plain writes never race conditional ones
		// because every engine mutation of a guarded record goes through
		// compare_and_swap.
		tokio::task::spawn_blocking(move || {
			std::fs::create_dir_all(&base_path)
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			let lock_path = base_path.join(".cas.lock");
			let lock_file = std::fs::OpenOptions::new()
				.create(true)
				.truncate(false)
				.write(true)
				.open(&lock_path)
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			lock_file
				.lock_exclusive()
				.map_err(|e| StorageError::Backend(e.to_string()))?;

			let current = match std::fs::read(&path) {
				Ok(data) => FileStorage::live_payload(&data)?,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
				Err(e) => return Err(StorageError::Backend(e.to_string())),
			};

			if current.as_deref() != expected.as_deref() {
				return Ok(false);
			}

			let header = FileHeader::new(ttl);
			let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
			file_data.extend_from_slice(&header.serialize());
			file_data.extend_from_slice(&value);

			let temp_path = path.with_extension("tmp");
			std::fs::write(&temp_path, file_data)
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			std::fs::rename(&temp_path, &path)
				.map_err(|e| StorageError::Backend(e.to_string()))?;

			// Lock released when lock_file drops
			Ok(true)
		})
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Build TTL fields dynamically based on StorageTable variants
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		for storage_table in StorageTable::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_table.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		let schema = Schema::new(vec![], optional_fields);
		schema.validate(config)
	}
}

/// Registry entry for the file storage backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_<table>`: TTL in seconds per storage table (default: 0, permanent)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	let ttl_config = TtlConfig::from_config(config);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		ttl_config,
	)))
}
