use super::reject;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::Json,
};
use kiosk_types::{APIError, Product, UpsertProductRequest};

/// Handles PUT /api/products/{id}.
pub async fn upsert_product(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Json(request): Json<UpsertProductRequest>,
) -> Result<Json<Product>, APIError> {
	let product = Product {
		id,
		name: request.name,
		description: request.description,
		category: request.category,
		price: request.price,
	};
	let product = state
		.engine
		.catalog()
		.upsert(product)
		.await
		.map_err(reject)?;
	Ok(Json(product))
}
