//! Order endpoints: creation, listing, partial update, items and history.

use super::reject;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use kiosk_types::{
	parse_status_list, APIError, CreateOrderRequest, HistoryFilter, ListHistoryQuery,
	ListOrdersQuery, Order, OrderFilter, OrderHistory, OrderSort, OrderStatus, Page,
	PageRequest, SetItemsRequest, UpdateOrder, UpdateOrderRequest,
};

/// Handles POST /api/orders.
pub async fn create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = state
		.engine
		.orders()
		.create(request.customer_id)
		.await
		.map_err(reject)?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders.
///
/// Listed orders carry no items; fetch a single order for those.
pub async fn list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Page<Order>>, APIError> {
	let sort = match query.sort.as_deref() {
		Some(raw) => raw.parse::<OrderSort>().map_err(APIError::bad_request)?,
		None => OrderSort::default(),
	};
	let filter = OrderFilter {
		customer_id: query.customer_id,
		statuses: parse_status_list(query.status.as_deref()),
		status_exclude: parse_status_list(query.status_exclude.as_deref()),
	};
	let page = PageRequest::normalize(query.page, query.limit, state.default_page_limit);

	let orders = state
		.engine
		.orders()
		.list(&filter, page, sort)
		.await
		.map_err(reject)?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.orders()
		.get_with_items(id)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles PATCH /api/orders/{id}.
pub async fn update_order(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, APIError> {
	let changes = UpdateOrder {
		customer_id: request.customer_id,
		status: request.status,
		staff_id: request.staff_id,
	};
	let order = state
		.engine
		.orders()
		.update(id, changes)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles DELETE /api/orders/{id}.
pub async fn delete_order(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<Json<Order>, APIError> {
	let order = state.engine.orders().delete(id).await.map_err(reject)?;
	Ok(Json(order))
}

/// Handles PUT /api/orders/{id}/items.
pub async fn set_items(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Json(request): Json<SetItemsRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.engine
		.orders()
		.set_items(id, request.items)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles GET /api/orders/{id}/history.
pub async fn list_history(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Query(query): Query<ListHistoryQuery>,
) -> Result<Json<Page<OrderHistory>>, APIError> {
	state.engine.orders().get(id).await.map_err(reject)?;

	let filter = HistoryFilter {
		status: query.status.as_deref().map(OrderStatus::parse),
		..HistoryFilter::for_order(id)
	};
	let page = PageRequest::normalize(query.page, query.limit, state.default_page_limit);

	let rows = state
		.engine
		.history()
		.list(&filter, page)
		.await
		.map_err(reject)?;
	Ok(Json(rows))
}
