//! Storage module for the kiosk.
//!
//! Provides the key-value backend abstraction, the typed `StorageService` that
//! serializes records as JSON under `namespace:id` keys, and `UnitOfWork`, a
//! batch of staged operations that a backend commits all-or-nothing.

use async_trait::async_trait;
use kiosk_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	/// An insert targeted a key that already exists.
	#[error("Key already exists: {0}")]
	Conflict(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// One staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
	/// Create or overwrite.
	Put { key: String, value: Vec<u8> },
	/// Create only. The whole batch fails with `Conflict` if the key exists.
	Insert { key: String, value: Vec<u8> },
	/// Remove if present.
	Delete { key: String },
}

/// Checks every `Insert` of a batch against the current contents and the
/// earlier operations of the same batch.
///
/// Backends call this while holding their write lock, before applying anything.
pub(crate) fn check_preconditions<F>(ops: &[StorageOp], exists: F) -> Result<(), StorageError>
where
	F: Fn(&str) -> bool,
{
	let mut staged: HashMap<&str, bool> = HashMap::new();
	for op in ops {
		match op {
			StorageOp::Put { key, .. } => {
				staged.insert(key, true);
			},
			StorageOp::Delete { key } => {
				staged.insert(key, false);
			},
			StorageOp::Insert { key, .. } => {
				let present = staged.get(key.as_str()).copied().unwrap_or_else(|| exists(key));
				if present {
					return Err(StorageError::Conflict(key.clone()));
				}
				staged.insert(key, true);
			},
		}
	}
	Ok(())
}

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// All keys starting with `prefix`, in no particular order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Atomically increments the integer stored at `key` (0 when absent) and
	/// returns the new value.
	async fn increment(&self, key: &str) -> Result<i64, StorageError>;

	/// Applies `ops` in order, all-or-nothing.
	///
	/// Preconditions (`Insert` on an existing key) are checked before any
	/// operation is applied; a failed check leaves storage untouched.
	async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StorageError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Signature of the factory each storage implementation provides.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Every built-in storage implementation as (name, factory).
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn compose_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Staged operations committed together through `StorageService::commit`.
///
/// Staging only serializes; nothing reaches the backend until commit.
#[derive(Debug, Default)]
pub struct UnitOfWork {
	ops: Vec<StorageOp>,
}

impl UnitOfWork {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stages a create-or-overwrite of `namespace:id`.
	pub fn put<T: Serialize>(&mut self, namespace: &str, id: &str, data: &T) -> Result<(), StorageError> {
		self.ops.push(StorageOp::Put {
			key: compose_key(namespace, id),
			value: encode(data)?,
		});
		Ok(())
	}

	/// Stages a create that fails the whole unit if `namespace:id` exists.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.ops.push(StorageOp::Insert {
			key: compose_key(namespace, id),
			value: encode(data)?,
		});
		Ok(())
	}

	pub fn delete(&mut self, namespace: &str, id: &str) {
		self.ops.push(StorageOp::Delete {
			key: compose_key(namespace, id),
		});
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn into_ops(self) -> Vec<StorageOp> {
		self.ops
	}
}

/// Typed storage over a backend. Values are stored as JSON.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores `data` under `namespace:id`, overwriting any previous value.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes = encode(data)?;
		self.backend.set_bytes(&compose_key(namespace, id), bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&compose_key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Like `retrieve`, with a missing key mapped to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Every value of a namespace. Keys removed between listing and reading are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = compose_key(namespace, "");
		let keys = self.backend.list_keys(&prefix).await?;

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(decode(&bytes)?),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Next value of the id sequence for `namespace`, starting at 1.
	pub async fn next_id(&self, namespace: &str) -> Result<i64, StorageError> {
		self.backend
			.increment(&StorageKey::Sequences.key(namespace))
			.await
	}

	pub fn unit_of_work(&self) -> UnitOfWork {
		UnitOfWork::new()
	}

	/// Commits a unit of work. Empty units are a no-op.
	pub async fn commit(&self, uow: UnitOfWork) -> Result<(), StorageError> {
		if uow.is_empty() {
			return Ok(());
		}
		self.backend.commit(uow.into_ops()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct Row {
		id: i64,
		label: String,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[test]
	fn test_preconditions_follow_batch_order() {
		let put = |key: &str| StorageOp::Put {
			key: key.to_string(),
			value: vec![],
		};
		let insert = |key: &str| StorageOp::Insert {
			key: key.to_string(),
			value: vec![],
		};
		let delete = |key: &str| StorageOp::Delete {
			key: key.to_string(),
		};

		assert!(check_preconditions(&[insert("a"), put("b")], |_| false).is_ok());
		assert!(matches!(
			check_preconditions(&[put("a"), insert("a")], |_| false),
			Err(StorageError::Conflict(key)) if key == "a"
		));
		assert!(check_preconditions(&[delete("a"), insert("a")], |_| true).is_ok());
		assert!(check_preconditions(&[insert("a")], |_| true).is_err());
	}

	#[tokio::test]
	async fn test_typed_round_trip() {
		let storage = service();
		let row = Row {
			id: 1,
			label: "first".into(),
		};

		storage.store("rows", "1", &row).await.unwrap();
		assert_eq!(storage.retrieve::<Row>("rows", "1").await.unwrap(), row);
		assert!(storage.retrieve_optional::<Row>("rows", "2").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_retrieve_all_scopes_to_namespace() {
		let storage = service();
		for id in 1..=3 {
			let row = Row {
				id,
				label: format!("row-{}", id),
			};
			storage.store("rows", &id.to_string(), &row).await.unwrap();
		}
		storage
			.store("rows_archive", "9", &Row { id: 9, label: "old".into() })
			.await
			.unwrap();

		let mut rows: Vec<Row> = storage.retrieve_all("rows").await.unwrap();
		rows.sort_by_key(|row| row.id);
		assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
	}

	#[tokio::test]
	async fn test_sequences_are_per_namespace() {
		let storage = service();
		assert_eq!(storage.next_id("orders").await.unwrap(), 1);
		assert_eq!(storage.next_id("orders").await.unwrap(), 2);
		assert_eq!(storage.next_id("payments").await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_failed_unit_of_work_writes_nothing() {
		let storage = service();
		storage
			.store("markers", "7", &Row { id: 7, label: "taken".into() })
			.await
			.unwrap();

		let mut uow = storage.unit_of_work();
		uow.put("rows", "1", &Row { id: 1, label: "a".into() }).unwrap();
		uow.insert("markers", "7", &Row { id: 7, label: "again".into() })
			.unwrap();

		assert!(matches!(
			storage.commit(uow).await,
			Err(StorageError::Conflict(_))
		));
		assert!(storage.retrieve_optional::<Row>("rows", "1").await.unwrap().is_none());
		assert_eq!(
			storage.retrieve::<Row>("markers", "7").await.unwrap().label,
			"taken"
		);
	}
}
