//! Event types published on the in-process event bus.
//!
//! Events are emitted only after the corresponding unit of work has been
//! committed, so subscribers never observe state that was rolled back.

use crate::{OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Main event type, grouped by the component that produces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KioskEvent {
	Order(OrderEvent),
	Payment(PaymentEvent),
}

/// Events produced by the order service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderEvent {
	/// An order was opened for a customer.
	Created { order_id: i64, customer_id: i64 },
	/// An order moved to a new status.
	StatusChanged {
		order_id: i64,
		from: OrderStatus,
		to: OrderStatus,
		staff_id: Option<i64>,
	},
	/// The line items of an open order were replaced.
	ItemsReplaced { order_id: i64, item_count: usize },
	/// An order and its history were removed.
	Deleted { order_id: i64 },
}

/// Events produced by the payment orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentEvent {
	/// A checkout was opened at the provider and recorded locally.
	CheckoutCreated {
		payment_id: i64,
		order_id: i64,
		external_id: String,
	},
	/// A webhook confirmed the payment.
	Confirmed {
		payment_id: i64,
		order_id: i64,
		status: PaymentStatus,
	},
}

impl KioskEvent {
	/// Order the event refers to.
	pub fn order_id(&self) -> i64 {
		match self {
			KioskEvent::Order(OrderEvent::Created { order_id, .. })
			| KioskEvent::Order(OrderEvent::StatusChanged { order_id, .. })
			| KioskEvent::Order(OrderEvent::ItemsReplaced { order_id, .. })
			| KioskEvent::Order(OrderEvent::Deleted { order_id })
			| KioskEvent::Payment(PaymentEvent::CheckoutCreated { order_id, .. })
			| KioskEvent::Payment(PaymentEvent::Confirmed { order_id, .. }) => *order_id,
		}
	}
}
