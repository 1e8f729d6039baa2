//! Page/limit handling for list operations.

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest page size honoured by list operations.
pub const MAX_PAGE_LIMIT: usize = 100;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
	pub page: usize,
	pub limit: usize,
}

impl Default for PageRequest {
	fn default() -> Self {
		Self {
			page: 1,
			limit: DEFAULT_PAGE_LIMIT,
		}
	}
}

impl PageRequest {
	/// Clamps raw query values: page starts at 1, limit falls back to
	/// `default_limit` when zero or absent and never exceeds `MAX_PAGE_LIMIT`.
	pub fn normalize(page: Option<usize>, limit: Option<usize>, default_limit: usize) -> Self {
		let limit = match limit {
			Some(0) | None => default_limit,
			Some(limit) => limit,
		};
		Self {
			page: page.unwrap_or(1).max(1),
			limit: limit.clamp(1, MAX_PAGE_LIMIT),
		}
	}

	pub fn offset(&self) -> usize {
		(self.page.saturating_sub(1)).saturating_mul(self.limit)
	}

	/// Slices an already ordered collection.
	pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
		let total = items.len();
		let items = items.into_iter().skip(self.offset()).take(self.limit).collect();
		Page {
			items,
			page: self.page,
			limit: self.limit,
			total,
		}
	}
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub page: usize,
	pub limit: usize,
	/// Number of matching records before paging.
	pub total: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize() {
		assert_eq!(PageRequest::normalize(None, None, 20), PageRequest { page: 1, limit: 20 });
		assert_eq!(PageRequest::normalize(Some(0), Some(0), 10), PageRequest { page: 1, limit: 10 });
		assert_eq!(
			PageRequest::normalize(Some(3), Some(500), 10),
			PageRequest {
				page: 3,
				limit: MAX_PAGE_LIMIT
			}
		);
	}

	#[test]
	fn test_apply() {
		let request = PageRequest { page: 2, limit: 3 };
		let page = request.apply((1..=8).collect::<Vec<_>>());
		assert_eq!(page.items, vec![4, 5, 6]);
		assert_eq!(page.total, 8);

		let past_end = PageRequest { page: 5, limit: 3 }.apply((1..=8).collect::<Vec<_>>());
		assert!(past_end.items.is_empty());
	}
}
