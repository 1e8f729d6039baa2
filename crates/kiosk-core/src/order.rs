//! Order aggregate service.
//!
//! Owns every write to an order. Status changes go through the state machine
//! and are committed together with their history row in one unit of work.
//! Writes for the same order are serialized through `OrderLocks`.

use crate::catalog::ProductCatalog;
use crate::engine::event_bus::EventBus;
use crate::history::HistoryRecorder;
use crate::locks::OrderLocks;
use crate::repository::OrderRepository;
use crate::state::OrderStateMachine;
use crate::KioskError;
use chrono::Utc;
use kiosk_storage::{StorageService, UnitOfWork};
use kiosk_types::{
	ItemRequest, KioskEvent, Order, OrderEvent, OrderFilter, OrderHistory, OrderItem, OrderSort,
	OrderStatus, Page, PageRequest, StorageKey, UpdateOrder,
};
use std::sync::Arc;
use tracing::instrument;

/// Result of staging an update into a caller-owned unit of work.
#[derive(Debug, Clone)]
pub struct StagedUpdate {
	pub order: Order,
	pub previous_status: OrderStatus,
	/// Present only when the status actually changed.
	pub history: Option<OrderHistory>,
}

impl StagedUpdate {
	fn event(&self) -> Option<KioskEvent> {
		self.history.as_ref().map(|row| {
			KioskEvent::Order(OrderEvent::StatusChanged {
				order_id: self.order.id,
				from: self.previous_status,
				to: self.order.status,
				staff_id: row.staff_id,
			})
		})
	}
}

pub struct OrderService {
	storage: Arc<StorageService>,
	orders: OrderRepository,
	history: Arc<HistoryRecorder>,
	catalog: Arc<ProductCatalog>,
	locks: Arc<OrderLocks>,
	event_bus: EventBus,
}

impl OrderService {
	pub fn new(
		storage: Arc<StorageService>,
		history: Arc<HistoryRecorder>,
		catalog: Arc<ProductCatalog>,
		locks: Arc<OrderLocks>,
		event_bus: EventBus,
	) -> Self {
		Self {
			orders: OrderRepository::new(storage.clone()),
			storage,
			history,
			catalog,
			locks,
			event_bus,
		}
	}

	/// Opens a new order and records its first history row.
	#[instrument(skip_all, fields(customer_id = customer_id))]
	pub async fn create(&self, customer_id: i64) -> Result<Order, KioskError> {
		if customer_id <= 0 {
			return Err(KioskError::invalid("customer is mandatory"));
		}

		let id = self.storage.next_id(StorageKey::Orders.as_str()).await?;
		let order = Order::open(id, customer_id, Utc::now());

		let mut uow = self.storage.unit_of_work();
		self.orders.create(&mut uow, &order)?;
		self.history
			.stage(&mut uow, id, OrderStatus::Open, None)
			.await?;
		self.storage.commit(uow).await?;

		tracing::info!(order_id = id, "Order created");
		self.event_bus
			.publish(KioskEvent::Order(OrderEvent::Created {
				order_id: id,
				customer_id,
			}))
			.ok();

		Ok(order)
	}

	/// The order row alone; `items` is always empty.
	pub async fn get(&self, id: i64) -> Result<Order, KioskError> {
		self.orders
			.find_by_id(id)
			.await?
			.ok_or_else(|| KioskError::not_found(format!("order {} not found", id)))
	}

	/// The order together with its line items.
	pub async fn get_with_items(&self, id: i64) -> Result<Order, KioskError> {
		let mut order = self.get(id).await?;
		order.items = self.orders.find_items(id).await?;
		Ok(order)
	}

	pub async fn list(
		&self,
		filter: &OrderFilter,
		page: PageRequest,
		sort: OrderSort,
	) -> Result<Page<Order>, KioskError> {
		let mut orders: Vec<Order> = self
			.orders
			.find_all()
			.await?
			.into_iter()
			.filter(|order| filter.matches(order))
			.collect();
		orders.sort_by(|a, b| sort.compare(a, b));
		Ok(page.apply(orders))
	}

	/// Applies `changes` and commits the order with its history row.
	#[instrument(skip_all, fields(order_id = id))]
	pub async fn update(&self, id: i64, changes: UpdateOrder) -> Result<Order, KioskError> {
		let _guard = self.locks.lock(id).await;

		let mut uow = self.storage.unit_of_work();
		let staged = self.stage_update(&mut uow, id, &changes).await?;
		self.storage.commit(uow).await?;

		self.announce(&staged);
		Ok(staged.order)
	}

	/// Validates `changes` against the stored order and stages the result.
	///
	/// Writes nothing when the requested status equals the current one. The
	/// caller must hold the order's lock and publish with `announce` after
	/// committing.
	pub async fn stage_update(
		&self,
		uow: &mut UnitOfWork,
		id: i64,
		changes: &UpdateOrder,
	) -> Result<StagedUpdate, KioskError> {
		let mut order = self.get(id).await?;
		let previous_status = order.status;

		if let Some(customer_id) = changes.customer_id {
			if customer_id != order.customer_id {
				return Err(KioskError::invalid(format!(
					"order {} belongs to customer {}, not {}",
					id, order.customer_id, customer_id
				)));
			}
		}

		let mut history = None;
		if let Some(status) = changes.status.filter(|status| *status != order.status) {
			OrderStateMachine::validate(order.status, status, changes.staff_id)?;

			order.status = status;
			order.updated_at = Utc::now();
			self.orders.update(uow, &order)?;
			history = Some(
				self.history
					.stage(uow, id, status, changes.staff_id)
					.await?,
			);
		}

		Ok(StagedUpdate {
			order,
			previous_status,
			history,
		})
	}

	/// Logs and publishes a committed update.
	pub(crate) fn announce(&self, staged: &StagedUpdate) {
		if let Some(event) = staged.event() {
			tracing::info!(
				order_id = staged.order.id,
				from = %staged.previous_status,
				to = %staged.order.status,
				"Order status changed"
			);
			self.event_bus.publish(event).ok();
		}
	}

	/// Replaces the line items of an OPEN order.
	///
	/// Repeated products are merged. Each line snapshots the product as it is
	/// in the catalog now.
	#[instrument(skip_all, fields(order_id = id, lines = items.len()))]
	pub async fn set_items(&self, id: i64, items: Vec<ItemRequest>) -> Result<Order, KioskError> {
		let _guard = self.locks.lock(id).await;

		let mut order = self.get(id).await?;
		if order.status != OrderStatus::Open {
			return Err(KioskError::invalid(format!(
				"items can only be changed while the order is {}, order {} is {}",
				OrderStatus::Open,
				id,
				order.status
			)));
		}

		let mut merged: Vec<(i64, u32)> = Vec::with_capacity(items.len());
		for item in items {
			if item.quantity == 0 {
				return Err(KioskError::invalid("quantity must be at least 1"));
			}
			match merged.iter_mut().find(|(product_id, _)| *product_id == item.product_id) {
				Some((_, quantity)) => {
					*quantity = quantity
						.checked_add(item.quantity)
						.ok_or_else(|| KioskError::invalid("quantity is too large"))?;
				},
				None => merged.push((item.product_id, item.quantity)),
			}
		}

		let mut lines = Vec::with_capacity(merged.len());
		for (product_id, quantity) in merged {
			lines.push(OrderItem {
				product: self.catalog.get(product_id).await?,
				quantity,
			});
		}

		order.updated_at = Utc::now();
		let mut uow = self.storage.unit_of_work();
		self.orders.update(&mut uow, &order)?;
		self.orders.set_items(&mut uow, id, &lines)?;
		self.storage.commit(uow).await?;

		self.event_bus
			.publish(KioskEvent::Order(OrderEvent::ItemsReplaced {
				order_id: id,
				item_count: lines.len(),
			}))
			.ok();

		order.items = lines;
		Ok(order)
	}

	/// Removes an order with its line items and history rows.
	#[instrument(skip_all, fields(order_id = id))]
	pub async fn delete(&self, id: i64) -> Result<Order, KioskError> {
		let _guard = self.locks.lock(id).await;

		let order = self.get(id).await?;
		let mut uow = self.storage.unit_of_work();
		self.orders.delete(&mut uow, id);
		let removed = self.history.stage_delete_for_order(&mut uow, id).await?;
		self.storage.commit(uow).await?;

		tracing::info!(history_rows = removed, "Order deleted");
		self.event_bus
			.publish(KioskEvent::Order(OrderEvent::Deleted { order_id: id }))
			.ok();
		Ok(order)
	}
}
