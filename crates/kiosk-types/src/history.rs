//! Order history audit records.
//!
//! Every status change of an order appends one `OrderHistory` row. Rows are
//! never updated; they disappear only when the owning order is deleted.

use crate::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderHistory {
	pub id: i64,
	pub order_id: i64,
	/// Status the order moved into.
	pub status: OrderStatus,
	/// Staff member responsible for the change, if any.
	#[serde(default)]
	pub staff_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

/// Input for appending a history row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewOrderHistory {
	pub order_id: i64,
	pub status: OrderStatus,
	#[serde(default)]
	pub staff_id: Option<i64>,
}

impl NewOrderHistory {
	/// Builds a history input, discarding non-positive staff ids.
	pub fn new(order_id: i64, status: OrderStatus, staff_id: Option<i64>) -> Self {
		Self {
			order_id,
			status,
			staff_id: staff_id.filter(|id| *id > 0),
		}
	}
}

/// Filters accepted by the history listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
	pub order_id: Option<i64>,
	pub status: Option<OrderStatus>,
	pub staff_id: Option<i64>,
}

impl HistoryFilter {
	pub fn for_order(order_id: i64) -> Self {
		Self {
			order_id: Some(order_id),
			..Default::default()
		}
	}

	pub fn matches(&self, row: &OrderHistory) -> bool {
		self.order_id.is_none_or(|id| id == row.order_id)
			&& self.status.is_none_or(|status| status == row.status)
			&& self.staff_id.is_none_or(|id| Some(id) == row.staff_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_non_positive_staff_is_dropped() {
		assert_eq!(NewOrderHistory::new(1, OrderStatus::Ready, Some(0)).staff_id, None);
		assert_eq!(NewOrderHistory::new(1, OrderStatus::Ready, Some(-4)).staff_id, None);
		assert_eq!(NewOrderHistory::new(1, OrderStatus::Ready, Some(9)).staff_id, Some(9));
	}

	#[test]
	fn test_filter() {
		let row = OrderHistory {
			id: 1,
			order_id: 3,
			status: OrderStatus::Preparing,
			staff_id: Some(5),
			created_at: Utc::now(),
		};

		assert!(HistoryFilter::for_order(3).matches(&row));
		assert!(!HistoryFilter::for_order(4).matches(&row));
		assert!(HistoryFilter {
			staff_id: Some(5),
			status: Some(OrderStatus::Preparing),
			..Default::default()
		}
		.matches(&row));
		assert!(!HistoryFilter {
			staff_id: Some(6),
			..Default::default()
		}
		.matches(&row));
	}
}
