//! Order types for the kiosk.
//!
//! Defines the order aggregate, its line items, the order status enumeration
//! together with the static transition table, and the request shapes used by
//! the order service (updates, filters, sorting).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A customer order.
///
/// `items` is only populated by the explicit line-item read; the persisted
/// order row never carries line items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Numeric identifier assigned on creation.
	pub id: i64,
	/// Customer that owns the order. Cannot be reassigned.
	pub customer_id: i64,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Timestamp when the order was created.
	pub ordered_at: DateTime<Utc>,
	/// Timestamp of the last persisted change.
	pub updated_at: DateTime<Utc>,
	/// Line items, loaded on demand.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub items: Vec<OrderItem>,
}

impl Order {
	/// Builds a fresh order in `OPEN` for the given customer.
	pub fn open(id: i64, customer_id: i64, now: DateTime<Utc>) -> Self {
		Self {
			id,
			customer_id,
			status: OrderStatus::Open,
			ordered_at: now,
			updated_at: now,
			items: Vec::new(),
		}
	}

	/// Sum of every line total, or `None` when it does not fit a `Decimal`.
	pub fn total(&self) -> Option<Decimal> {
		self.items
			.iter()
			.try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
	}

	/// Returns a copy of the order without line items, as stored in the order row.
	pub fn without_items(&self) -> Self {
		Self {
			items: Vec::new(),
			..self.clone()
		}
	}
}

/// Product snapshot carried by a line item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
	pub id: i64,
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub category: String,
	/// Unit price at the time the line item was recorded.
	pub price: Decimal,
}

/// An (order, product, quantity) association.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
	pub product: Product,
	pub quantity: u32,
}

impl OrderItem {
	/// Unit price times quantity, or `None` on overflow.
	pub fn line_total(&self) -> Option<Decimal> {
		self.product.price.checked_mul(Decimal::from(self.quantity))
	}
}

/// Request to place a product on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRequest {
	pub product_id: i64,
	pub quantity: u32,
}

/// Partial update applied through the order service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOrder {
	/// Must match the stored customer when supplied.
	#[serde(default)]
	pub customer_id: Option<i64>,
	/// Target status. Equal to the current status means no transition.
	#[serde(default)]
	pub status: Option<OrderStatus>,
	/// Staff member performing the transition.
	#[serde(default)]
	pub staff_id: Option<i64>,
}

impl UpdateOrder {
	/// Update that only moves the order to `status`.
	pub fn status(status: OrderStatus) -> Self {
		Self {
			status: Some(status),
			..Default::default()
		}
	}

	pub fn with_staff(mut self, staff_id: i64) -> Self {
		self.staff_id = Some(staff_id);
		self
	}
}

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
	/// Order is being assembled by the customer.
	Open,
	/// Order was abandoned. Terminal.
	Cancelled,
	/// Checkout started, waiting for payment confirmation.
	Pending,
	/// Payment confirmed, waiting for the kitchen.
	Received,
	/// Kitchen is preparing the order.
	Preparing,
	/// Order is ready for pickup.
	Ready,
	/// Order was handed over. Terminal.
	Completed,
	/// Sentinel for values that failed to parse.
	Undefined,
}

/// Static transition table. Statuses missing from the table have no successors.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;

	HashMap::from([
		(Open, HashSet::from([Cancelled, Pending])),
		(Cancelled, HashSet::new()),
		(Pending, HashSet::from([Open, Received, Cancelled])),
		(Received, HashSet::from([Preparing, Cancelled])),
		(Preparing, HashSet::from([Ready, Cancelled])),
		(Ready, HashSet::from([Completed])),
		(Completed, HashSet::new()),
	])
});

impl OrderStatus {
	/// Every defined status, excluding the `Undefined` sentinel.
	pub const ALL: [OrderStatus; 7] = [
		OrderStatus::Open,
		OrderStatus::Cancelled,
		OrderStatus::Pending,
		OrderStatus::Received,
		OrderStatus::Preparing,
		OrderStatus::Ready,
		OrderStatus::Completed,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Open => "OPEN",
			OrderStatus::Cancelled => "CANCELLED",
			OrderStatus::Pending => "PENDING",
			OrderStatus::Received => "RECEIVED",
			OrderStatus::Preparing => "PREPARING",
			OrderStatus::Ready => "READY",
			OrderStatus::Completed => "COMPLETED",
			OrderStatus::Undefined => "UNDEFINED",
		}
	}

	/// Parses a status name case-insensitively. Unknown names map to `Undefined`.
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_uppercase().as_str() {
			"OPEN" => OrderStatus::Open,
			"CANCELLED" => OrderStatus::Cancelled,
			"PENDING" => OrderStatus::Pending,
			"RECEIVED" => OrderStatus::Received,
			"PREPARING" => OrderStatus::Preparing,
			"READY" => OrderStatus::Ready,
			"COMPLETED" => OrderStatus::Completed,
			_ => OrderStatus::Undefined,
		}
	}

	/// Whether `next` is listed as a successor of `self`.
	pub fn allows(&self, next: OrderStatus) -> bool {
		TRANSITIONS
			.get(self)
			.is_some_and(|set| set.contains(&next))
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::parse(s))
	}
}

impl Serialize for OrderStatus {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for OrderStatus {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Ok(Self::parse(&value))
	}
}

/// Filters accepted by the order listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
	pub customer_id: Option<i64>,
	/// Keep only orders in one of these statuses. Empty means any.
	pub statuses: Vec<OrderStatus>,
	/// Drop orders in any of these statuses.
	pub status_exclude: Vec<OrderStatus>,
}

impl OrderFilter {
	pub fn matches(&self, order: &Order) -> bool {
		if self.customer_id.is_some_and(|id| id != order.customer_id) {
			return false;
		}
		if !self.statuses.is_empty() && !self.statuses.contains(&order.status) {
			return false;
		}
		!self.status_exclude.contains(&order.status)
	}
}

/// Field used to sort order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSortField {
	#[default]
	Id,
	CustomerId,
	Status,
	OrderedAt,
	UpdatedAt,
}

/// Sort specification, parsed from `field` or `-field` (descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSort {
	pub field: OrderSortField,
	pub descending: bool,
}

impl OrderSort {
	pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
		let ordering = match self.field {
			OrderSortField::Id => a.id.cmp(&b.id),
			OrderSortField::CustomerId => a.customer_id.cmp(&b.customer_id).then(a.id.cmp(&b.id)),
			OrderSortField::Status => a
				.status
				.as_str()
				.cmp(b.status.as_str())
				.then(a.id.cmp(&b.id)),
			OrderSortField::OrderedAt => a.ordered_at.cmp(&b.ordered_at).then(a.id.cmp(&b.id)),
			OrderSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)),
		};

		if self.descending {
			ordering.reverse()
		} else {
			ordering
		}
	}
}

impl FromStr for OrderSort {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let (descending, name) = match s.strip_prefix('-') {
			Some(rest) => (true, rest),
			None => (false, s),
		};

		let field = match name {
			"" | "id" => OrderSortField::Id,
			"customer_id" => OrderSortField::CustomerId,
			"status" => OrderSortField::Status,
			"ordered_at" => OrderSortField::OrderedAt,
			"updated_at" => OrderSortField::UpdatedAt,
			other => return Err(format!("unsupported sort field '{}'", other)),
		};

		Ok(Self { field, descending })
	}
}
