//! Product lookup used to price order lines.

use crate::KioskError;
use kiosk_storage::StorageService;
use kiosk_types::{Product, StorageKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

/// Highest unit price accepted by the catalog, in whole currency units.
pub const MAX_PRODUCT_PRICE: i64 = 1_000_000;

/// Products stored under `products:<id>`.
///
/// Order lines copy the product at the time they are set, so later catalog
/// changes never reprice an existing order.
pub struct ProductCatalog {
	storage: Arc<StorageService>,
}

impl ProductCatalog {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn get(&self, product_id: i64) -> Result<Product, KioskError> {
		self.storage
			.retrieve_optional(StorageKey::Products.as_str(), &product_id.to_string())
			.await?
			.ok_or_else(|| KioskError::not_found(format!("product {} not found", product_id)))
	}

	/// Creates or replaces a product.
	#[instrument(skip_all, fields(product_id = product.id))]
	pub async fn upsert(&self, product: Product) -> Result<Product, KioskError> {
		if product.id <= 0 {
			return Err(KioskError::invalid("product id must be positive"));
		}
		if product.name.trim().is_empty() {
			return Err(KioskError::invalid("product name is mandatory"));
		}
		if product.category.trim().is_empty() {
			return Err(KioskError::invalid("product category is mandatory"));
		}
		if product.price < Decimal::ZERO {
			return Err(KioskError::invalid("product price must not be negative"));
		}
		if product.price > Decimal::from(MAX_PRODUCT_PRICE) {
			return Err(KioskError::invalid(format!(
				"product price must not exceed {}",
				MAX_PRODUCT_PRICE
			)));
		}

		self.storage
			.store(
				StorageKey::Products.as_str(),
				&product.id.to_string(),
				&product,
			)
			.await?;
		tracing::debug!(name = %product.name, price = %product.price, "Product stored");
		Ok(product)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kiosk_storage::implementations::memory::MemoryStorage;
	use rust_decimal::Decimal;

	fn catalog() -> ProductCatalog {
		ProductCatalog::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	fn product(id: i64, price: Decimal) -> Product {
		Product {
			id,
			name: "Burger".into(),
			description: "Double cheese".into(),
			category: "Meal".into(),
			price,
		}
	}

	#[tokio::test]
	async fn test_upsert_then_get() {
		let catalog = catalog();
		catalog.upsert(product(1, Decimal::new(1000, 2))).await.unwrap();

		let mut repriced = product(1, Decimal::new(1250, 2));
		repriced.name = "Burger XL".into();
		catalog.upsert(repriced).await.unwrap();

		let stored = catalog.get(1).await.unwrap();
		assert_eq!(stored.name, "Burger XL");
		assert_eq!(stored.price, Decimal::new(1250, 2));
	}

	#[tokio::test]
	async fn test_missing_product() {
		assert_eq!(
			catalog().get(9).await,
			Err(KioskError::NotFound("product 9 not found".into()))
		);
	}

	#[tokio::test]
	async fn test_upsert_validation() {
		let catalog = catalog();
		assert!(matches!(
			catalog.upsert(product(1, Decimal::new(-1, 0))).await,
			Err(KioskError::InvalidInput(_))
		));

		let mut unnamed = product(1, Decimal::ONE);
		unnamed.name = " ".into();
		assert!(matches!(
			catalog.upsert(unnamed).await,
			Err(KioskError::InvalidInput(_))
		));

		assert!(matches!(
			catalog.upsert(product(0, Decimal::ONE)).await,
			Err(KioskError::InvalidInput(_))
		));
	}

	#[tokio::test]
	async fn test_upsert_price_cap() {
		let catalog = catalog();
		catalog
			.upsert(product(1, Decimal::from(MAX_PRODUCT_PRICE)))
			.await
			.unwrap();

		assert_eq!(
			catalog.upsert(product(2, Decimal::MAX)).await,
			Err(KioskError::InvalidInput(
				"product price must not exceed 1000000".into()
			))
		);
		assert!(catalog.get(2).await.is_err());
	}
}
