//! Payment records and checkout payloads exchanged with the payment provider.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A local payment attempt for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
	pub id: i64,
	pub order_id: i64,
	pub status: PaymentStatus,
	/// Identifier assigned by the payment provider.
	pub external_id: String,
	/// Display data returned by the provider, rendered as a QR code on the kiosk.
	pub qr_data: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Status of a payment.
///
/// Only `Processing -> Confirmed` is driven by the service; `Failed` and
/// `Aborted` are accepted in stored data but never set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
	Processing,
	Confirmed,
	Failed,
	Aborted,
}

impl PaymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			PaymentStatus::Processing => "PROCESSING",
			PaymentStatus::Confirmed => "CONFIRMED",
			PaymentStatus::Failed => "FAILED",
			PaymentStatus::Aborted => "ABORTED",
		}
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Payload sent to the provider to open a checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutRequest {
	/// Local order id, stringified.
	pub external_reference: String,
	#[serde(with = "rust_decimal::serde::float")]
	pub total_amount: Decimal,
	pub title: String,
	pub description: String,
	pub notification_url: String,
	pub items: Vec<CheckoutItem>,
}

/// One itemized line of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutItem {
	pub category: String,
	pub title: String,
	pub description: String,
	#[serde(with = "rust_decimal::serde::float")]
	pub unit_price: Decimal,
	pub quantity: u32,
	pub unit_measure: String,
	#[serde(with = "rust_decimal::serde::float")]
	pub total_amount: Decimal,
}

/// Provider response to a checkout request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutResponse {
	/// Provider payment identifier, echoed back by webhooks as `resource`.
	pub external_id: String,
	pub qr_data: String,
}

/// Inbound webhook notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookNotification {
	pub resource: String,
	#[serde(default)]
	pub topic: String,
}
