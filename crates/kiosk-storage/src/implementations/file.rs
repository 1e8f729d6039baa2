//! File-based storage backend.
//!
//! Each key is one file under `storage_path`. File names are the key with every
//! byte outside `[A-Za-z0-9._-]` escaped as `%XX`, so keys can be listed back
//! from a directory scan. Single writes go through a temp file and a rename.
//!
//! Batches are serialized by an in-process mutex and an exclusive `fs2` lock on
//! `storage_path/.lock`, which also keeps several processes sharing the same
//! directory from interleaving commits. Preconditions are evaluated under the
//! lock before the first file is touched.
//!
//! Before a batch touches any key file it is written to `storage_path/.journal`
//! together with the previous value of every key. A write that fails part way
//! restores those values. A journal left behind by a crash is replayed, or
//! rolled back if replaying fails, the next time the lock is taken.

use crate::{check_preconditions, StorageError, StorageInterface, StorageOp};
use async_trait::async_trait;
use fs2::FileExt;
use kiosk_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const EXTENSION: &str = "bin";
const LOCK_FILE: &str = ".lock";
const JOURNAL_FILE: &str = ".journal";

pub struct FileStorage {
	base_path: PathBuf,
	write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	/// Creates the directory if needed and finishes any interrupted batch, so
	/// reads never observe one.
	pub fn open(base_path: PathBuf) -> Result<Self, StorageError> {
		with_exclusive_lock(&base_path, |_| Ok(()))?;
		Ok(Self::new(base_path))
	}

	fn file_path(&self, key: &str) -> PathBuf {
		file_path(&self.base_path, key)
	}

	/// Runs `f` on a blocking thread while holding both write locks.
	async fn locked<F, R>(&self, f: F) -> Result<R, StorageError>
	where
		F: FnOnce(&Path) -> Result<R, StorageError> + Send + 'static,
		R: Send + 'static,
	{
		let _guard = self.write_lock.lock().await;
		let base_path = self.base_path.clone();

		tokio::task::spawn_blocking(move || with_exclusive_lock(&base_path, f))
			.await
			.map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
	}
}

fn with_exclusive_lock<F, R>(base_path: &Path, f: F) -> Result<R, StorageError>
where
	F: FnOnce(&Path) -> Result<R, StorageError>,
{
	fs::create_dir_all(base_path).map_err(backend)?;
	let lock = OpenOptions::new()
		.create(true)
		.truncate(false)
		.write(true)
		.open(base_path.join(LOCK_FILE))
		.map_err(backend)?;
	lock.lock_exclusive().map_err(backend)?;

	let result = recover(base_path).and_then(|()| f(base_path));

	if let Err(e) = FileExt::unlock(&lock) {
		tracing::warn!(error = %e, "Failed to release storage lock");
	}
	result
}

fn backend(e: io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

fn encode_key(key: &str) -> String {
	let mut name = String::with_capacity(key.len());
	for byte in key.bytes() {
		match byte {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => name.push(byte as char),
			_ => name.push_str(&format!("%{:02X}", byte)),
		}
	}
	name
}

fn decode_key(name: &str) -> Option<String> {
	let bytes = name.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = name.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

fn file_path(base: &Path, key: &str) -> PathBuf {
	base.join(format!("{}.{}", encode_key(key), EXTENSION))
}

fn write_atomic(path: &Path, value: &[u8]) -> io::Result<()> {
	let temp_path = path.with_extension("tmp");
	fs::write(&temp_path, value)?;
	fs::rename(&temp_path, path)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
	match fs::remove_file(path) {
		Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
		_ => Ok(()),
	}
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
	match fs::read(path) {
		Ok(bytes) => Ok(Some(bytes)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e),
	}
}

/// One key of a journaled batch. `None` means the file is absent.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
	key: String,
	before: Option<Vec<u8>>,
	after: Option<Vec<u8>>,
}

impl JournalEntry {
	fn capture(base: &Path, op: StorageOp) -> Result<Self, StorageError> {
		let (key, after) = match op {
			StorageOp::Put { key, value } | StorageOp::Insert { key, value } => (key, Some(value)),
			StorageOp::Delete { key } => (key, None),
		};
		let before = read_optional(&file_path(base, &key)).map_err(backend)?;
		Ok(Self { key, before, after })
	}
}

fn set_file(base: &Path, key: &str, value: Option<&[u8]>) -> io::Result<()> {
	let path = file_path(base, key);
	match value {
		Some(value) => write_atomic(&path, value),
		None => remove_if_present(&path),
	}
}

fn redo(base: &Path, entries: &[JournalEntry]) -> Result<(), StorageError> {
	for entry in entries {
		set_file(base, &entry.key, entry.after.as_deref()).map_err(backend)?;
	}
	Ok(())
}

/// Restores every key to its value before the batch, last entry first.
fn undo(base: &Path, entries: &[JournalEntry]) -> Result<(), StorageError> {
	for entry in entries.iter().rev() {
		set_file(base, &entry.key, entry.before.as_deref()).map_err(backend)?;
	}
	Ok(())
}

fn write_journal(base: &Path, entries: &[JournalEntry]) -> Result<(), StorageError> {
	let bytes =
		serde_json::to_vec(entries).map_err(|e| StorageError::Serialization(e.to_string()))?;
	let path = base.join(JOURNAL_FILE);
	let temp_path = path.with_extension("tmp");

	let mut file = File::create(&temp_path).map_err(backend)?;
	file.write_all(&bytes).map_err(backend)?;
	file.sync_all().map_err(backend)?;
	fs::rename(&temp_path, &path).map_err(backend)
}

fn clear_journal(base: &Path) -> Result<(), StorageError> {
	remove_if_present(&base.join(JOURNAL_FILE)).map_err(backend)
}

/// Applies the journaled batch, restoring the previous values if any write
/// fails. The journal is kept when even the restore fails.
fn apply_journaled(base: &Path, entries: &[JournalEntry]) -> Result<(), StorageError> {
	if let Err(e) = redo(base, entries) {
		tracing::warn!(error = %e, "Storage batch failed part way, restoring previous values");
		if let Err(undo_err) = undo(base, entries) {
			tracing::error!(error = %undo_err, "Failed to restore storage batch");
			return Err(StorageError::Backend(format!(
				"{}; restore failed: {}",
				e, undo_err
			)));
		}
		clear_journal(base)?;
		return Err(e);
	}
	clear_journal(base)
}

fn recover(base: &Path) -> Result<(), StorageError> {
	let Some(bytes) = read_optional(&base.join(JOURNAL_FILE)).map_err(backend)? else {
		return Ok(());
	};
	let entries: Vec<JournalEntry> =
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;

	tracing::warn!(keys = entries.len(), "Found interrupted storage batch");
	match apply_journaled(base, &entries) {
		Ok(()) => tracing::info!("Interrupted storage batch replayed"),
		Err(e) => tracing::warn!(error = %e, "Interrupted storage batch rolled back"),
	}
	// A rolled back batch still leaves storage consistent.
	if base.join(JOURNAL_FILE).exists() {
		return Err(StorageError::Backend(
			"interrupted storage batch could not be recovered".into(),
		));
	}
	Ok(())
}

fn apply(base: &Path, ops: Vec<StorageOp>) -> Result<(), StorageError> {
	check_preconditions(&ops, |key| file_path(base, key).exists())?;

	let entries = ops
		.into_iter()
		.map(|op| JournalEntry::capture(base, op))
		.collect::<Result<Vec<_>, _>>()?;
	write_journal(base, &entries)?;
	apply_journaled(base, &entries)
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match tokio::fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(backend(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.commit(vec![StorageOp::Put {
			key: key.to_string(),
			value,
		}])
		.await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.commit(vec![StorageOp::Delete {
			key: key.to_string(),
		}])
		.await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		tokio::fs::try_exists(self.file_path(key))
			.await
			.map_err(backend)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut entries = match tokio::fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend)? {
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
				continue;
			}
			let Some(key) = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(decode_key)
			else {
				tracing::debug!(path = ?path, "Skipping file with undecodable name");
				continue;
			};
			if key.starts_with(prefix) {
				keys.push(key);
			}
		}
		Ok(keys)
	}

	async fn increment(&self, key: &str) -> Result<i64, StorageError> {
		let key = key.to_string();
		self.locked(move |base| {
			let path = file_path(base, &key);
			let current = match fs::read(&path) {
				Ok(bytes) => serde_json::from_slice::<i64>(&bytes)
					.map_err(|e| StorageError::Serialization(e.to_string()))?,
				Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
				Err(e) => return Err(backend(e)),
			};
			let next = current + 1;
			write_atomic(&path, next.to_string().as_bytes()).map_err(backend)?;
			Ok(next)
		})
		.await
	}

	async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StorageError> {
		let count = ops.len();
		self.locked(move |base| apply(base, ops)).await?;
		tracing::trace!(operations = count, "Committed storage batch");
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path cannot be empty".to_string()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Creates a file backend.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::open(PathBuf::from(storage_path))?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
