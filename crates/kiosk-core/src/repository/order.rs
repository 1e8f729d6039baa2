use kiosk_storage::{StorageError, StorageService, UnitOfWork};
use kiosk_types::{Order, OrderItem, StorageKey};
use std::sync::Arc;

/// Order rows under `orders:<id>` and their line items under `order_items:<id>`.
///
/// The order row never carries items; they are read with `find_items`.
pub struct OrderRepository {
	storage: Arc<StorageService>,
}

impl OrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::Orders.as_str(), &id.to_string())
			.await
	}

	pub async fn find_all(&self) -> Result<Vec<Order>, StorageError> {
		self.storage.retrieve_all(StorageKey::Orders.as_str()).await
	}

	pub async fn find_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StorageError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::OrderItems.as_str(), &order_id.to_string())
			.await?
			.unwrap_or_default())
	}

	pub fn create(&self, uow: &mut UnitOfWork, order: &Order) -> Result<(), StorageError> {
		uow.insert(
			StorageKey::Orders.as_str(),
			&order.id.to_string(),
			&order.without_items(),
		)
	}

	pub fn update(&self, uow: &mut UnitOfWork, order: &Order) -> Result<(), StorageError> {
		uow.put(
			StorageKey::Orders.as_str(),
			&order.id.to_string(),
			&order.without_items(),
		)
	}

	/// Replaces the whole item list of an order.
	pub fn set_items(
		&self,
		uow: &mut UnitOfWork,
		order_id: i64,
		items: &[OrderItem],
	) -> Result<(), StorageError> {
		uow.put(StorageKey::OrderItems.as_str(), &order_id.to_string(), &items)
	}

	/// Stages removal of the order row and its items.
	pub fn delete(&self, uow: &mut UnitOfWork, id: i64) {
		let id = id.to_string();
		uow.delete(StorageKey::Orders.as_str(), &id);
		uow.delete(StorageKey::OrderItems.as_str(), &id);
	}
}
