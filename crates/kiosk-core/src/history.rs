//! Append-only order history.
//!
//! Every accepted status change, and the creation of an order, appends exactly
//! one row. The recorder stamps `created_at` itself and exposes no update.

use crate::repository::HistoryRepository;
use crate::KioskError;
use chrono::Utc;
use kiosk_storage::{StorageService, UnitOfWork};
use kiosk_types::{
	HistoryFilter, NewOrderHistory, OrderHistory, OrderStatus, Page, PageRequest, StorageKey,
};
use std::sync::Arc;
use tracing::instrument;

pub struct HistoryRecorder {
	storage: Arc<StorageService>,
	rows: HistoryRepository,
}

impl HistoryRecorder {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			rows: HistoryRepository::new(storage.clone()),
			storage,
		}
	}

	/// Appends and commits one row.
	#[instrument(skip_all, fields(order_id = order_id, status = %status))]
	pub async fn create(
		&self,
		order_id: i64,
		status: OrderStatus,
		staff_id: Option<i64>,
	) -> Result<OrderHistory, KioskError> {
		let mut uow = self.storage.unit_of_work();
		let row = self.stage(&mut uow, order_id, status, staff_id).await?;
		self.storage.commit(uow).await?;
		Ok(row)
	}

	/// Allocates a row and stages it into `uow`; nothing is visible until the
	/// caller commits.
	pub async fn stage(
		&self,
		uow: &mut UnitOfWork,
		order_id: i64,
		status: OrderStatus,
		staff_id: Option<i64>,
	) -> Result<OrderHistory, KioskError> {
		let input = NewOrderHistory::new(order_id, status, staff_id);
		let id = self
			.storage
			.next_id(StorageKey::OrderHistory.as_str())
			.await?;

		let row = OrderHistory {
			id,
			order_id: input.order_id,
			status: input.status,
			staff_id: input.staff_id,
			created_at: Utc::now(),
		};
		self.rows.create(uow, &row)?;
		Ok(row)
	}

	/// Matching rows ordered by id.
	pub async fn list(
		&self,
		filter: &HistoryFilter,
		page: PageRequest,
	) -> Result<Page<OrderHistory>, KioskError> {
		let mut rows: Vec<OrderHistory> = self
			.rows
			.find_all()
			.await?
			.into_iter()
			.filter(|row| filter.matches(row))
			.collect();
		rows.sort_by_key(|row| row.id);
		Ok(page.apply(rows))
	}

	pub async fn get(&self, id: i64) -> Result<OrderHistory, KioskError> {
		self.rows
			.find_by_id(id)
			.await?
			.ok_or_else(|| KioskError::not_found(format!("order history {} not found", id)))
	}

	/// Removes one row and returns it.
	pub async fn delete(&self, id: i64) -> Result<OrderHistory, KioskError> {
		let row = self.get(id).await?;
		let mut uow = self.storage.unit_of_work();
		self.rows.delete(&mut uow, id);
		self.storage.commit(uow).await?;
		Ok(row)
	}

	/// Stages removal of every row of an order; returns how many.
	pub(crate) async fn stage_delete_for_order(
		&self,
		uow: &mut UnitOfWork,
		order_id: i64,
	) -> Result<usize, KioskError> {
		let rows = self.rows.find_all().await?;
		let mut count = 0;
		for row in rows.iter().filter(|row| row.order_id == order_id) {
			self.rows.delete(uow, row.id);
			count += 1;
		}
		Ok(count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kiosk_storage::implementations::memory::MemoryStorage;

	fn recorder() -> HistoryRecorder {
		HistoryRecorder::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_create_stamps_and_clears_staff() {
		let recorder = recorder();
		let before = Utc::now();

		let row = recorder
			.create(4, OrderStatus::Ready, Some(0))
			.await
			.unwrap();

		assert_eq!(row.order_id, 4);
		assert_eq!(row.staff_id, None);
		assert!(row.created_at >= before);
		assert_eq!(recorder.get(row.id).await.unwrap(), row);
	}

	#[tokio::test]
	async fn test_list_filters_and_pages_in_id_order() {
		let recorder = recorder();
		for status in [
			OrderStatus::Open,
			OrderStatus::Pending,
			OrderStatus::Received,
			OrderStatus::Preparing,
		] {
			recorder.create(1, status, Some(2)).await.unwrap();
		}
		recorder.create(2, OrderStatus::Open, None).await.unwrap();

		let page = recorder
			.list(
				&HistoryFilter::for_order(1),
				PageRequest { page: 2, limit: 3 },
			)
			.await
			.unwrap();
		assert_eq!(page.total, 4);
		assert_eq!(page.items.len(), 1);
		assert_eq!(page.items[0].status, OrderStatus::Preparing);

		let open = recorder
			.list(
				&HistoryFilter {
					status: Some(OrderStatus::Open),
					..Default::default()
				},
				PageRequest::default(),
			)
			.await
			.unwrap();
		assert_eq!(
			open.items.iter().map(|r| r.order_id).collect::<Vec<_>>(),
			vec![1, 2]
		);
	}

	#[tokio::test]
	async fn test_staged_rows_are_invisible_until_commit() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let recorder = HistoryRecorder::new(storage.clone());

		let mut uow = storage.unit_of_work();
		let row = recorder
			.stage(&mut uow, 1, OrderStatus::Open, None)
			.await
			.unwrap();
		assert!(matches!(
			recorder.get(row.id).await,
			Err(KioskError::NotFound(_))
		));

		storage.commit(uow).await.unwrap();
		assert_eq!(recorder.get(row.id).await.unwrap().status, OrderStatus::Open);
	}

	#[tokio::test]
	async fn test_delete_returns_row() {
		let recorder = recorder();
		let row = recorder.create(1, OrderStatus::Open, None).await.unwrap();

		assert_eq!(recorder.delete(row.id).await.unwrap(), row);
		assert!(matches!(
			recorder.delete(row.id).await,
			Err(KioskError::NotFound(_))
		));
	}
}
