//! Per-order async locks.
//!
//! Every write path that reads an order and then commits a change to it holds
//! the order's lock for the whole read-modify-commit sequence, so concurrent
//! requests for the same order run one after another. Different orders never
//! contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<i64, Arc<Mutex<()>>>;

/// An entry exists only while some task holds or waits for the order's lock.
#[derive(Default)]
pub struct OrderLocks {
	locks: Arc<LockMap>,
}

impl OrderLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits for and returns the lock of `order_id`.
	pub async fn lock(&self, order_id: i64) -> OrderLockGuard {
		// Clone the Arc out so the map shard is not held across the await.
		let lock = self.locks.entry(order_id).or_default().clone();
		let guard = lock.lock_owned().await;
		OrderLockGuard {
			order_id,
			guard: Some(guard),
			locks: Arc::clone(&self.locks),
		}
	}

	/// Number of orders currently locked or awaited.
	#[cfg(test)]
	fn len(&self) -> usize {
		self.locks.len()
	}

	#[cfg(test)]
	fn is_empty(&self) -> bool {
		self.locks.is_empty()
	}
}

/// Holds an order's lock. Dropping it releases the lock and removes the map
/// entry when no other task is holding or waiting for it.
pub struct OrderLockGuard {
	order_id: i64,
	guard: Option<OwnedMutexGuard<()>>,
	locks: Arc<LockMap>,
}

impl Drop for OrderLockGuard {
	fn drop(&mut self) {
		self.guard.take();
		// Waiters hold a clone of the Arc, so a count of one means only the map is left.
		self.locks
			.remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn test_same_order_serializes() {
		let locks = Arc::new(OrderLocks::new());
		let guard = locks.lock(1).await;

		let contender = {
			let locks = locks.clone();
			tokio::spawn(async move {
				let _guard = locks.lock(1).await;
			})
		};

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!contender.is_finished());

		drop(guard);
		tokio::time::timeout(Duration::from_secs(1), contender)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn test_entries_removed_after_release() {
		let locks = Arc::new(OrderLocks::new());
		for order_id in 1..=50 {
			let _guard = locks.lock(order_id).await;
			assert_eq!(locks.len(), 1);
		}
		assert!(locks.is_empty());

		let guard = locks.lock(7).await;
		let waiter = {
			let locks = locks.clone();
			tokio::spawn(async move {
				let _guard = locks.lock(7).await;
			})
		};
		tokio::time::sleep(Duration::from_millis(20)).await;

		// The waiter still needs the entry.
		drop(guard);
		assert_eq!(locks.len(), 1);

		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
		assert!(locks.is_empty());
	}

	#[tokio::test]
	async fn test_different_orders_do_not_contend() {
		let locks = OrderLocks::new();
		let _first = locks.lock(1).await;
		tokio::time::timeout(Duration::from_millis(100), locks.lock(2))
			.await
			.unwrap();
	}
}
