//! In-memory storage backend.
//!
//! Keeps every value in a `HashMap` behind a single `RwLock`. Nothing survives
//! a restart; intended for tests and single-process deployments.

use crate::{check_preconditions, StorageError, StorageInterface, StorageOp};
use async_trait::async_trait;
use kiosk_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.store.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.store.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.store.read().await.contains_key(key))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.keys()
			.filter(|key| key.starts_with(prefix))
			.cloned()
			.collect())
	}

	async fn increment(&self, key: &str) -> Result<i64, StorageError> {
		let mut store = self.store.write().await;
		let current = match store.get(key) {
			Some(bytes) => serde_json::from_slice::<i64>(bytes)
				.map_err(|e| StorageError::Serialization(e.to_string()))?,
			None => 0,
		};
		let next = current + 1;
		let bytes =
			serde_json::to_vec(&next).map_err(|e| StorageError::Serialization(e.to_string()))?;
		store.insert(key.to_string(), bytes);
		Ok(next)
	}

	async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		check_preconditions(&ops, |key| store.contains_key(key))?;

		for op in ops {
			match op {
				StorageOp::Put { key, value } | StorageOp::Insert { key, value } => {
					store.insert(key, value);
				},
				StorageOp::Delete { key } => {
					store.remove(&key);
				},
			}
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// The memory backend takes no options.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
