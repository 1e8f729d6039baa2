//! Storage namespaces used by the kiosk.

use std::str::FromStr;

/// Namespaces under which kiosk records are stored.
///
/// Keys are composed as `"<namespace>:<id>"` by the storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order rows, keyed by order id.
	Orders,
	/// Line items of an order, keyed by order id.
	OrderItems,
	/// Order history rows, keyed by history id.
	OrderHistory,
	/// Payment rows, keyed by payment id.
	Payments,
	/// Maps an external payment id to the local payment id.
	PaymentByExternal,
	/// Marks the order that currently has a `PROCESSING` payment.
	PaymentProcessing,
	/// Product catalog entries, keyed by product id.
	Products,
	/// Monotonic id sequences, keyed by namespace.
	Sequences,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderItems => "order_items",
			StorageKey::OrderHistory => "order_history",
			StorageKey::Payments => "payments",
			StorageKey::PaymentByExternal => "payment_by_external",
			StorageKey::PaymentProcessing => "payment_processing",
			StorageKey::Products => "products",
			StorageKey::Sequences => "sequences",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderItems,
			Self::OrderHistory,
			Self::Payments,
			Self::PaymentByExternal,
			Self::PaymentProcessing,
			Self::Products,
			Self::Sequences,
		]
		.into_iter()
	}

	/// Full key for `id` inside this namespace.
	pub fn key(&self, id: impl std::fmt::Display) -> String {
		format!("{}:{}", self.as_str(), id)
	}

	/// Prefix matching every key of this namespace.
	pub fn prefix(&self) -> String {
		format!("{}:", self.as_str())
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
