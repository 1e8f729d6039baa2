//! Checkout endpoints.

use super::reject;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use kiosk_types::{APIError, CreatePaymentRequest, Payment};

/// Handles POST /api/payments.
///
/// Returns the PROCESSING payment of the order, starting a checkout when
/// there is none.
pub async fn create_payment(
	State(state): State<AppState>,
	Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), APIError> {
	let payment = state
		.engine
		.payments()
		.create(request.order_id)
		.await
		.map_err(reject)?;
	Ok((StatusCode::CREATED, Json(payment)))
}

/// Handles GET /api/payments/{order_id}.
pub async fn get_payment(
	State(state): State<AppState>,
	Path(order_id): Path<i64>,
) -> Result<Json<Payment>, APIError> {
	let payment = state
		.engine
		.payments()
		.get(order_id)
		.await
		.map_err(reject)?;
	Ok(Json(payment))
}
