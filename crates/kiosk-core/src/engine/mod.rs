//! Kiosk engine.
//!
//! Holds the wired services shared by every request handler, and runs the
//! event log loop until shutdown.

pub mod event_bus;

use crate::catalog::ProductCatalog;
use crate::history::HistoryRecorder;
use crate::locks::OrderLocks;
use crate::order::OrderService;
use crate::payment::{CheckoutSettings, PaymentOrchestrator};
use kiosk_config::Config;
use kiosk_payment::PaymentGatewayService;
use kiosk_storage::StorageService;
use kiosk_types::{KioskEvent, OrderEvent, PaymentEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Clone)]
pub struct KioskEngine {
	pub(crate) config: Config,
	pub(crate) orders: Arc<OrderService>,
	pub(crate) history: Arc<HistoryRecorder>,
	pub(crate) payments: Arc<PaymentOrchestrator>,
	pub(crate) catalog: Arc<ProductCatalog>,
	pub(crate) event_bus: event_bus::EventBus,
}

impl KioskEngine {
	/// Wires the services over one storage backend and one payment gateway.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		gateway: Arc<PaymentGatewayService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let locks = Arc::new(OrderLocks::new());
		let history = Arc::new(HistoryRecorder::new(storage.clone()));
		let catalog = Arc::new(ProductCatalog::new(storage.clone()));

		let orders = Arc::new(OrderService::new(
			storage.clone(),
			history.clone(),
			catalog.clone(),
			locks.clone(),
			event_bus.clone(),
		));

		let payments = Arc::new(PaymentOrchestrator::new(
			storage,
			orders.clone(),
			gateway,
			locks,
			CheckoutSettings::from(&config.payment),
			event_bus.clone(),
		));

		Self {
			config,
			orders,
			history,
			payments,
			catalog,
			event_bus,
		}
	}

	/// Logs every published event until ctrl-c.
	pub async fn run(&self) {
		let mut events = self.event_bus.subscribe();

		loop {
			tokio::select! {
				received = events.recv() => {
					match received {
						Ok(event) => log_event(&event),
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event log fell behind");
						}
						Err(RecvError::Closed) => break,
					}
				}

				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown signal received");
					break;
				}
			}
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn orders(&self) -> &Arc<OrderService> {
		&self.orders
	}

	pub fn history(&self) -> &Arc<HistoryRecorder> {
		&self.history
	}

	pub fn payments(&self) -> &Arc<PaymentOrchestrator> {
		&self.payments
	}

	pub fn catalog(&self) -> &Arc<ProductCatalog> {
		&self.catalog
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}
}

fn log_event(event: &KioskEvent) {
	let order_id = event.order_id();
	match event {
		KioskEvent::Order(OrderEvent::Created { customer_id, .. }) => {
			tracing::info!(order_id, customer_id, "Order opened");
		},
		KioskEvent::Order(OrderEvent::StatusChanged {
			from, to, staff_id, ..
		}) => {
			tracing::info!(order_id, %from, %to, ?staff_id, "Order moved");
		},
		KioskEvent::Order(OrderEvent::ItemsReplaced { item_count, .. }) => {
			tracing::debug!(order_id, item_count, "Order items replaced");
		},
		KioskEvent::Order(OrderEvent::Deleted { .. }) => {
			tracing::info!(order_id, "Order removed");
		},
		KioskEvent::Payment(PaymentEvent::CheckoutCreated {
			payment_id,
			external_id,
			..
		}) => {
			tracing::info!(order_id, payment_id, %external_id, "Checkout opened");
		},
		KioskEvent::Payment(PaymentEvent::Confirmed {
			payment_id, status, ..
		}) => {
			tracing::info!(order_id, payment_id, %status, "Payment settled");
		},
	}
}
