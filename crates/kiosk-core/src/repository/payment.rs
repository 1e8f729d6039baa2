use kiosk_storage::{StorageError, StorageService, UnitOfWork};
use kiosk_types::{Payment, PaymentStatus, StorageKey};
use std::sync::Arc;

/// Payment rows and their two indexes.
///
/// - `payments:<id>` holds the payment.
/// - `payment_by_external:<external_id>` maps the provider id to the payment id.
/// - `payment_processing:<order_id>` exists while the order has a PROCESSING
///   payment. It is written with an insert, so a second PROCESSING payment for
///   the same order fails the whole unit of work with `Conflict`.
pub struct PaymentRepository {
	storage: Arc<StorageService>,
}

impl PaymentRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::Payments.as_str(), &id.to_string())
			.await
	}

	pub fn create(&self, uow: &mut UnitOfWork, payment: &Payment) -> Result<(), StorageError> {
		let id = payment.id.to_string();
		uow.insert(StorageKey::Payments.as_str(), &id, payment)?;
		if payment.status == PaymentStatus::Processing {
			uow.insert(
				StorageKey::PaymentProcessing.as_str(),
				&payment.order_id.to_string(),
				&payment.id,
			)?;
		}
		uow.put(
			StorageKey::PaymentByExternal.as_str(),
			&payment.external_id,
			&payment.id,
		)
	}

	/// Latest payment of an order, by id.
	pub async fn get_by_order_id(&self, order_id: i64) -> Result<Option<Payment>, StorageError> {
		let payments: Vec<Payment> = self
			.storage
			.retrieve_all(StorageKey::Payments.as_str())
			.await?;
		Ok(payments
			.into_iter()
			.filter(|p| p.order_id == order_id)
			.max_by_key(|p| p.id))
	}

	pub async fn get_by_order_id_and_status(
		&self,
		order_id: i64,
		status: PaymentStatus,
	) -> Result<Option<Payment>, StorageError> {
		if status == PaymentStatus::Processing {
			let Some(payment_id) = self.processing_marker(order_id).await? else {
				return Ok(None);
			};
			return Ok(self
				.find_by_id(payment_id)
				.await?
				.filter(|p| p.status == PaymentStatus::Processing));
		}

		let payments: Vec<Payment> = self
			.storage
			.retrieve_all(StorageKey::Payments.as_str())
			.await?;
		Ok(payments
			.into_iter()
			.filter(|p| p.order_id == order_id && p.status == status)
			.max_by_key(|p| p.id))
	}

	pub async fn get_by_external_id(
		&self,
		external_id: &str,
	) -> Result<Option<Payment>, StorageError> {
		let payment_id: Option<i64> = self
			.storage
			.retrieve_optional(StorageKey::PaymentByExternal.as_str(), external_id)
			.await?;
		match payment_id {
			Some(id) => self.find_by_id(id).await,
			None => Ok(None),
		}
	}

	/// Stages `payment` with its new status and returns the staged copy.
	///
	/// Leaving PROCESSING releases the order's marker when it points at this
	/// payment.
	pub async fn update_status(
		&self,
		uow: &mut UnitOfWork,
		payment: &Payment,
		status: PaymentStatus,
		now: chrono::DateTime<chrono::Utc>,
	) -> Result<Payment, StorageError> {
		let mut updated = payment.clone();
		updated.status = status;
		updated.updated_at = now;

		uow.put(
			StorageKey::Payments.as_str(),
			&updated.id.to_string(),
			&updated,
		)?;
		if status != PaymentStatus::Processing
			&& self.processing_marker(payment.order_id).await? == Some(payment.id)
		{
			uow.delete(
				StorageKey::PaymentProcessing.as_str(),
				&payment.order_id.to_string(),
			);
		}
		Ok(updated)
	}

	async fn processing_marker(&self, order_id: i64) -> Result<Option<i64>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::PaymentProcessing.as_str(), &order_id.to_string())
			.await
	}
}
