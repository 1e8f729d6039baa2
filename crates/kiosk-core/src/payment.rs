//! Payment orchestrator.
//!
//! Bridges local order state with the external payment provider. Checkout
//! opens a provider checkout and records the payment while moving the order
//! to PENDING; the webhook confirms the payment and moves the order to
//! RECEIVED. Each side commits its local writes as one unit of work, under
//! the order's lock.

use crate::engine::event_bus::EventBus;
use crate::locks::OrderLocks;
use crate::order::OrderService;
use crate::repository::PaymentRepository;
use crate::state::OrderStateMachine;
use crate::KioskError;
use chrono::Utc;
use kiosk_config::PaymentConfig;
use kiosk_payment::PaymentGatewayService;
use kiosk_storage::{StorageError, StorageService};
use kiosk_types::{
	CheckoutItem, CheckoutRequest, KioskEvent, Order, OrderStatus, Payment, PaymentEvent,
	PaymentStatus, StorageKey, UpdateOrder,
};
use std::sync::Arc;
use tracing::instrument;

/// Unit of measure sent for every checkout line.
const UNIT_MEASURE: &str = "unit";

/// Presentation fields sent with every checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
	pub title: String,
	pub description: String,
	pub notification_url: String,
}

impl From<&PaymentConfig> for CheckoutSettings {
	fn from(config: &PaymentConfig) -> Self {
		Self {
			title: config.checkout_title.clone(),
			description: config.checkout_description.clone(),
			notification_url: config.notification_url.clone(),
		}
	}
}

pub struct PaymentOrchestrator {
	storage: Arc<StorageService>,
	payments: PaymentRepository,
	orders: Arc<OrderService>,
	gateway: Arc<PaymentGatewayService>,
	locks: Arc<OrderLocks>,
	settings: CheckoutSettings,
	event_bus: EventBus,
}

impl PaymentOrchestrator {
	pub fn new(
		storage: Arc<StorageService>,
		orders: Arc<OrderService>,
		gateway: Arc<PaymentGatewayService>,
		locks: Arc<OrderLocks>,
		settings: CheckoutSettings,
		event_bus: EventBus,
	) -> Self {
		Self {
			payments: PaymentRepository::new(storage.clone()),
			storage,
			orders,
			gateway,
			locks,
			settings,
			event_bus,
		}
	}

	/// Opens a checkout for an order, or returns the one already in progress.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn create(&self, order_id: i64) -> Result<Payment, KioskError> {
		let _guard = self.locks.lock(order_id).await;

		if let Some(existing) = self
			.payments
			.get_by_order_id_and_status(order_id, PaymentStatus::Processing)
			.await?
		{
			tracing::debug!(payment_id = existing.id, "Checkout already in progress");
			return Ok(existing);
		}

		let order = match self.orders.get_with_items(order_id).await {
			Ok(order) => order,
			Err(KioskError::NotFound(_)) => return Err(KioskError::not_found("order is mandatory")),
			Err(e) => return Err(e),
		};
		if order.items.is_empty() {
			return Err(KioskError::not_found("order without products"));
		}
		// Refuse before the provider is involved if the order cannot move to PENDING.
		if order.status != OrderStatus::Pending
			&& !OrderStateMachine::can_transition(order.status, OrderStatus::Pending)
		{
			return Err(KioskError::invalid(format!(
				"invalid status transition from {} to {}",
				order.status,
				OrderStatus::Pending
			)));
		}

		let request = self.checkout_request(&order)?;
		let checkout = self.gateway.create_checkout(&request).await.map_err(|e| {
			tracing::warn!(error = %e, "Checkout failed at the payment provider");
			KioskError::from(e)
		})?;

		let now = Utc::now();
		let payment = Payment {
			id: self.storage.next_id(StorageKey::Payments.as_str()).await?,
			order_id,
			status: PaymentStatus::Processing,
			external_id: checkout.external_id,
			qr_data: checkout.qr_data,
			created_at: now,
			updated_at: now,
		};

		let mut uow = self.storage.unit_of_work();
		self.payments.create(&mut uow, &payment)?;
		let staged = self
			.orders
			.stage_update(&mut uow, order_id, &UpdateOrder::status(OrderStatus::Pending))
			.await
			.map_err(|e| KioskError::internal(format!("failed to advance order: {}", e)))?;

		match self.storage.commit(uow).await {
			Ok(()) => {},
			Err(StorageError::Conflict(key)) => {
				tracing::warn!(
					external_id = %payment.external_id,
					%key,
					"Another checkout for this order was recorded first"
				);
				return self
					.payments
					.get_by_order_id_and_status(order_id, PaymentStatus::Processing)
					.await?
					.ok_or_else(|| KioskError::internal("processing payment vanished"));
			},
			Err(e) => {
				tracing::error!(
					external_id = %payment.external_id,
					error = %e,
					"Checkout opened at the provider but not recorded"
				);
				return Err(e.into());
			},
		}

		tracing::info!(
			payment_id = payment.id,
			external_id = %payment.external_id,
			"Checkout created"
		);
		self.orders.announce(&staged);
		self.event_bus
			.publish(KioskEvent::Payment(PaymentEvent::CheckoutCreated {
				payment_id: payment.id,
				order_id,
				external_id: payment.external_id.clone(),
			}))
			.ok();

		Ok(payment)
	}

	/// Handles a provider notification for the payment `resource`.
	///
	/// The payment is confirmed whatever its current status, so a redelivered
	/// notification is applied again. `topic` is only logged.
	#[instrument(skip_all, fields(external_id = %resource, topic = %topic))]
	pub async fn update(&self, resource: &str, topic: &str) -> Result<Payment, KioskError> {
		let payment = self.by_external_id(resource).await?;
		let _guard = self.locks.lock(payment.order_id).await;
		// Re-read under the lock.
		let payment = self.by_external_id(resource).await?;

		let mut uow = self.storage.unit_of_work();
		let confirmed = self
			.payments
			.update_status(&mut uow, &payment, PaymentStatus::Confirmed, Utc::now())
			.await?;
		let staged = self
			.orders
			.stage_update(
				&mut uow,
				payment.order_id,
				&UpdateOrder::status(OrderStatus::Received),
			)
			.await?;
		self.storage.commit(uow).await?;

		tracing::info!(
			payment_id = confirmed.id,
			order_id = confirmed.order_id,
			"Payment confirmed"
		);
		self.orders.announce(&staged);
		self.event_bus
			.publish(KioskEvent::Payment(PaymentEvent::Confirmed {
				payment_id: confirmed.id,
				order_id: confirmed.order_id,
				status: confirmed.status,
			}))
			.ok();

		Ok(confirmed)
	}

	/// Latest payment of an order.
	pub async fn get(&self, order_id: i64) -> Result<Payment, KioskError> {
		self.payments
			.get_by_order_id(order_id)
			.await?
			.ok_or_else(|| KioskError::not_found(format!("payment for order {} not found", order_id)))
	}

	async fn by_external_id(&self, external_id: &str) -> Result<Payment, KioskError> {
		self.payments
			.get_by_external_id(external_id)
			.await?
			.ok_or_else(|| KioskError::not_found(format!("payment {} not found", external_id)))
	}

	/// Fails with InvalidInput when a line or the order total overflows.
	fn checkout_request(&self, order: &Order) -> Result<CheckoutRequest, KioskError> {
		let out_of_range = || KioskError::invalid(format!("order {} total is out of range", order.id));

		let items = order
			.items
			.iter()
			.map(|item| {
				Ok(CheckoutItem {
					category: item.product.category.clone(),
					title: item.product.name.clone(),
					description: item.product.description.clone(),
					unit_price: item.product.price,
					quantity: item.quantity,
					unit_measure: UNIT_MEASURE.to_string(),
					total_amount: item.line_total().ok_or_else(out_of_range)?,
				})
			})
			.collect::<Result<Vec<_>, KioskError>>()?;

		Ok(CheckoutRequest {
			external_reference: order.id.to_string(),
			total_amount: order.total().ok_or_else(out_of_range)?,
			title: self.settings.title.clone(),
			description: self.settings.description.clone(),
			notification_url: self.settings.notification_url.clone(),
			items,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::ProductCatalog;
	use crate::history::HistoryRecorder;
	use async_trait::async_trait;
	use kiosk_payment::{PaymentGatewayError, PaymentGatewayInterface};
	use kiosk_storage::implementations::memory::MemoryStorage;
	use kiosk_types::{
		CheckoutResponse, ConfigSchema, HistoryFilter, ItemRequest, PageRequest, Product,
	};
	use mockall::mock;
	use rust_decimal::Decimal;
	use std::sync::Mutex;
	use std::time::Duration;

	mock! {
		pub Gateway {}

		#[async_trait]
		impl PaymentGatewayInterface for Gateway {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;

			async fn create_checkout(
				&self,
				request: &CheckoutRequest,
			) -> Result<CheckoutResponse, PaymentGatewayError>;
		}
	}

	struct Fixture {
		storage: Arc<StorageService>,
		payments: PaymentOrchestrator,
		orders: Arc<OrderService>,
		history: Arc<HistoryRecorder>,
		catalog: Arc<ProductCatalog>,
	}

	fn fixture(gateway: MockGateway) -> Fixture {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let history = Arc::new(HistoryRecorder::new(storage.clone()));
		let catalog = Arc::new(ProductCatalog::new(storage.clone()));
		let locks = Arc::new(OrderLocks::new());
		let event_bus = EventBus::new(64);
		let orders = Arc::new(OrderService::new(
			storage.clone(),
			history.clone(),
			catalog.clone(),
			locks.clone(),
			event_bus.clone(),
		));
		let payments = PaymentOrchestrator::new(
			storage.clone(),
			orders.clone(),
			Arc::new(PaymentGatewayService::new(Box::new(gateway))),
			locks,
			CheckoutSettings {
				title: "Kiosk order".into(),
				description: "Self-service kiosk order".into(),
				notification_url: "http://kiosk.test/api/webhooks/payments".into(),
			},
			event_bus,
		);
		Fixture {
			storage,
			payments,
			orders,
			history,
			catalog,
		}
	}

	fn approve(external_id: &'static str) -> MockGateway {
		let mut gateway = MockGateway::new();
		gateway.expect_create_checkout().times(1).returning(move |request| {
			Ok(CheckoutResponse {
				external_id: external_id.to_string(),
				qr_data: format!("qr:{}", request.external_reference),
			})
		});
		gateway
	}

	/// An OPEN order with two burgers at 10.00 and one soda at 5.00.
	async fn order_with_items(fixture: &Fixture) -> Order {
		for (id, name, category, cents) in [(1, "Burger", "Meal", 1000), (2, "Soda", "Drink", 500)] {
			fixture
				.catalog
				.upsert(Product {
					id,
					name: name.into(),
					description: format!("{} description", name),
					category: category.into(),
					price: Decimal::new(cents, 2),
				})
				.await
				.unwrap();
		}

		let order = fixture.orders.create(1).await.unwrap();
		fixture
			.orders
			.set_items(
				order.id,
				vec![
					ItemRequest { product_id: 1, quantity: 2 },
					ItemRequest { product_id: 2, quantity: 1 },
				],
			)
			.await
			.unwrap()
	}

	async fn history_statuses(fixture: &Fixture, order_id: i64) -> Vec<OrderStatus> {
		fixture
			.history
			.list(&HistoryFilter::for_order(order_id), PageRequest::default())
			.await
			.unwrap()
			.items
			.into_iter()
			.map(|row| row.status)
			.collect()
	}

	#[tokio::test]
	async fn test_checkout_payload_totals() {
		let seen = Arc::new(Mutex::new(None));
		let mut gateway = MockGateway::new();
		{
			let seen = seen.clone();
			gateway
				.expect_create_checkout()
				.times(1)
				.returning(move |request| {
					*seen.lock().unwrap() = Some(request.clone());
					Ok(CheckoutResponse {
						external_id: "ext-1".into(),
						qr_data: "qr".into(),
					})
				});
		}
		let fixture = fixture(gateway);
		let order = order_with_items(&fixture).await;

		fixture.payments.create(order.id).await.unwrap();

		let request = seen.lock().unwrap().take().unwrap();
		assert_eq!(request.external_reference, order.id.to_string());
		assert_eq!(request.total_amount, Decimal::new(2500, 2));
		assert_eq!(
			request.items.iter().map(|i| i.total_amount).collect::<Vec<_>>(),
			vec![Decimal::new(2000, 2), Decimal::new(500, 2)]
		);
		assert_eq!(request.items[0].title, "Burger");
		assert_eq!(request.items[0].category, "Meal");
		assert_eq!(request.items[0].quantity, 2);
		assert_eq!(request.items[0].unit_measure, "unit");
		assert_eq!(request.notification_url, "http://kiosk.test/api/webhooks/payments");
	}

	#[tokio::test]
	async fn test_checkout_total_overflow_is_rejected() {
		let mut gateway = MockGateway::new();
		gateway.expect_create_checkout().times(0);
		let fixture = fixture(gateway);

		// Stored directly: the catalog refuses prices this large.
		fixture
			.storage
			.store(
				StorageKey::Products.as_str(),
				"1",
				&Product {
					id: 1,
					name: "Gold burger".into(),
					description: String::new(),
					category: "Meal".into(),
					price: Decimal::MAX,
				},
			)
			.await
			.unwrap();
		let order = fixture.orders.create(1).await.unwrap();
		fixture
			.orders
			.set_items(order.id, vec![ItemRequest { product_id: 1, quantity: 2 }])
			.await
			.unwrap();

		let err = fixture.payments.create(order.id).await.unwrap_err();
		assert_eq!(
			err,
			KioskError::InvalidInput(format!("order {} total is out of range", order.id))
		);

		assert_eq!(fixture.orders.get(order.id).await.unwrap().status, OrderStatus::Open);
		assert!(fixture.payments.get(order.id).await.is_err());

		// The lock was released: a second attempt fails the same way instead of hanging.
		let again = tokio::time::timeout(Duration::from_secs(1), fixture.payments.create(order.id))
			.await
			.unwrap();
		assert!(matches!(again, Err(KioskError::InvalidInput(_))));
	}

	#[tokio::test]
	async fn test_checkout_moves_order_to_pending() {
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;

		let payment = fixture.payments.create(order.id).await.unwrap();

		assert_eq!(payment.status, PaymentStatus::Processing);
		assert_eq!(payment.external_id, "ext-1");
		assert_eq!(payment.qr_data, format!("qr:{}", order.id));
		assert_eq!(
			fixture.orders.get(order.id).await.unwrap().status,
			OrderStatus::Pending
		);
		assert_eq!(
			history_statuses(&fixture, order.id).await,
			vec![OrderStatus::Open, OrderStatus::Pending]
		);
		assert_eq!(fixture.payments.get(order.id).await.unwrap(), payment);
	}

	#[tokio::test]
	async fn test_repeated_checkout_reuses_processing_payment() {
		// times(1) fails the test on a second provider call.
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;

		let first = fixture.payments.create(order.id).await.unwrap();
		let second = fixture.payments.create(order.id).await.unwrap();

		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn test_checkout_after_reopening_reuses_processing_payment() {
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;

		let first = fixture.payments.create(order.id).await.unwrap();
		fixture
			.orders
			.update(order.id, UpdateOrder::status(OrderStatus::Open))
			.await
			.unwrap();

		let again = fixture.payments.create(order.id).await.unwrap();
		assert_eq!(again, first);
		assert_eq!(
			fixture.orders.get(order.id).await.unwrap().status,
			OrderStatus::Open
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_checkouts_call_provider_once() {
		let mut gateway = MockGateway::new();
		gateway.expect_create_checkout().times(1).returning(|_| {
			std::thread::sleep(Duration::from_millis(20));
			Ok(CheckoutResponse {
				external_id: "ext-1".into(),
				qr_data: "qr".into(),
			})
		});
		let fixture = Arc::new(fixture(gateway));
		let order_id = order_with_items(&fixture).await.id;

		let attempts = (0..8).map(|_| {
			let fixture = fixture.clone();
			tokio::spawn(async move { fixture.payments.create(order_id).await })
		});
		let payments: Vec<Payment> = futures::future::join_all(attempts)
			.await
			.into_iter()
			.map(|joined| joined.unwrap().unwrap())
			.collect();

		assert!(payments.iter().all(|p| p.id == payments[0].id));
		assert_eq!(
			history_statuses(&fixture, order_id).await,
			vec![OrderStatus::Open, OrderStatus::Pending]
		);
	}

	#[tokio::test]
	async fn test_missing_order_and_empty_order() {
		let fixture = fixture(MockGateway::new());

		assert_eq!(
			fixture.payments.create(42).await,
			Err(KioskError::NotFound("order is mandatory".into()))
		);

		let order = fixture.orders.create(1).await.unwrap();
		assert_eq!(
			fixture.payments.create(order.id).await,
			Err(KioskError::NotFound("order without products".into()))
		);
	}

	#[tokio::test]
	async fn test_order_that_cannot_become_pending_is_refused() {
		let fixture = fixture(MockGateway::new());
		let order = order_with_items(&fixture).await;
		fixture
			.orders
			.update(order.id, UpdateOrder::status(OrderStatus::Cancelled))
			.await
			.unwrap();

		assert!(matches!(
			fixture.payments.create(order.id).await,
			Err(KioskError::InvalidInput(_))
		));
		assert!(matches!(
			fixture.payments.get(order.id).await,
			Err(KioskError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_provider_failure_changes_nothing() {
		let mut gateway = MockGateway::new();
		gateway.expect_create_checkout().times(1).returning(|_| {
			Err(PaymentGatewayError::Http {
				status: 502,
				body: "bad gateway".into(),
			})
		});
		let fixture = fixture(gateway);
		let order = order_with_items(&fixture).await;

		assert!(matches!(
			fixture.payments.create(order.id).await,
			Err(KioskError::Internal(_))
		));
		assert_eq!(
			fixture.orders.get(order.id).await.unwrap().status,
			OrderStatus::Open
		);
		assert!(fixture.payments.get(order.id).await.is_err());
		assert_eq!(history_statuses(&fixture, order.id).await, vec![OrderStatus::Open]);
	}

	#[tokio::test]
	async fn test_webhook_confirms_payment_and_receives_order() {
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;
		fixture.payments.create(order.id).await.unwrap();

		let payment = fixture.payments.update("ext-1", "payment").await.unwrap();

		assert_eq!(payment.status, PaymentStatus::Confirmed);
		assert_eq!(
			fixture.orders.get(order.id).await.unwrap().status,
			OrderStatus::Received
		);
		assert_eq!(
			fixture.payments.get(order.id).await.unwrap().status,
			PaymentStatus::Confirmed
		);
		assert_eq!(
			history_statuses(&fixture, order.id).await,
			vec![OrderStatus::Open, OrderStatus::Pending, OrderStatus::Received]
		);
	}

	#[tokio::test]
	async fn test_webhook_for_unknown_payment() {
		let fixture = fixture(MockGateway::new());
		assert_eq!(
			fixture.payments.update("nope", "payment").await,
			Err(KioskError::NotFound("payment nope not found".into()))
		);
	}

	/// Redelivery is not guarded. Whether a second notification for a
	/// CONFIRMED payment should be a strict no-op is still undecided; these
	/// tests pin down the current behavior.
	#[tokio::test]
	async fn test_redelivered_webhook_is_reapplied() {
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;
		fixture.payments.create(order.id).await.unwrap();

		let first = fixture.payments.update("ext-1", "payment").await.unwrap();
		let second = fixture.payments.update("ext-1", "payment").await.unwrap();

		assert_eq!(second.status, PaymentStatus::Confirmed);
		assert!(second.updated_at >= first.updated_at);
		// The order is already RECEIVED, so no extra history row.
		assert_eq!(history_statuses(&fixture, order.id).await.len(), 3);
	}

	#[tokio::test]
	async fn test_redelivered_webhook_after_preparation_is_rejected() {
		let fixture = fixture(approve("ext-1"));
		let order = order_with_items(&fixture).await;
		fixture.payments.create(order.id).await.unwrap();
		fixture.payments.update("ext-1", "payment").await.unwrap();
		fixture
			.orders
			.update(
				order.id,
				UpdateOrder::status(OrderStatus::Preparing).with_staff(5),
			)
			.await
			.unwrap();

		assert!(matches!(
			fixture.payments.update("ext-1", "payment").await,
			Err(KioskError::InvalidInput(_))
		));
		assert_eq!(
			fixture.orders.get(order.id).await.unwrap().status,
			OrderStatus::Preparing
		);
	}
}
