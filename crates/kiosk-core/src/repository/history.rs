use kiosk_storage::{StorageError, StorageService, UnitOfWork};
use kiosk_types::{OrderHistory, StorageKey};
use std::sync::Arc;

/// History rows under `order_history:<id>`.
///
/// Rows are only ever inserted or deleted; there is no overwrite path.
pub struct HistoryRepository {
	storage: Arc<StorageService>,
}

impl HistoryRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn find_by_id(&self, id: i64) -> Result<Option<OrderHistory>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::OrderHistory.as_str(), &id.to_string())
			.await
	}

	pub async fn find_all(&self) -> Result<Vec<OrderHistory>, StorageError> {
		self.storage
			.retrieve_all(StorageKey::OrderHistory.as_str())
			.await
	}

	pub fn create(&self, uow: &mut UnitOfWork, row: &OrderHistory) -> Result<(), StorageError> {
		uow.insert(StorageKey::OrderHistory.as_str(), &row.id.to_string(), row)
	}

	pub fn delete(&self, uow: &mut UnitOfWork, id: i64) {
		uow.delete(StorageKey::OrderHistory.as_str(), &id.to_string());
	}
}
