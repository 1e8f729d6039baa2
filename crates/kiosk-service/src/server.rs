//! HTTP server for the kiosk API.
//!
//! Routing, binding and error mapping only; every rule lives in the engine.

use crate::apis;
use axum::{
	extract::{DefaultBodyLimit, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::Json,
	routing::{get, post, put},
	Router,
};
use kiosk_config::{ApiConfig, CorsConfig};
use kiosk_core::KioskEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<KioskEngine>,
	/// Page size used when a list request has no `limit`.
	pub default_page_limit: usize,
}

/// Builds the `/api` router with its middleware stack.
pub fn router(api_config: &ApiConfig, engine: Arc<KioskEngine>) -> Router {
	let state = AppState {
		engine,
		default_page_limit: api_config.default_page_limit,
	};

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/health", get(handle_health))
				.route(
					"/orders",
					post(apis::order::create_order).get(apis::order::list_orders),
				)
				.route(
					"/orders/{id}",
					get(apis::order::get_order)
						.patch(apis::order::update_order)
						.delete(apis::order::delete_order),
				)
				.route("/orders/{id}/items", put(apis::order::set_items))
				.route("/orders/{id}/history", get(apis::order::list_history))
				.route("/payments", post(apis::payment::create_payment))
				.route("/payments/{order_id}", get(apis::payment::get_payment))
				.route(
					"/webhooks/payments",
					post(apis::webhook::handle_payment_notification),
				)
				.route("/products/{id}", put(apis::product::upsert_product)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(timeout_layer(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<KioskEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Kiosk API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Requests still running after `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
	TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Without a `[api.cors]` section every origin is allowed. Entries that do
/// not parse are skipped with a warning.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origin = if cors.allowed_origins.iter().any(|o| o == "*") {
		AllowOrigin::any()
	} else {
		AllowOrigin::list(parse_all::<HeaderValue>("origin", &cors.allowed_origins))
	};
	let methods = if cors.allowed_methods.iter().any(|m| m == "*") {
		AllowMethods::any()
	} else {
		AllowMethods::list(parse_all::<Method>("method", &cors.allowed_methods))
	};
	let headers = if cors.allowed_headers.iter().any(|h| h == "*") {
		AllowHeaders::any()
	} else {
		AllowHeaders::list(parse_all::<HeaderName>("header", &cors.allowed_headers))
	};

	CorsLayer::new()
		.allow_origin(origin)
		.allow_methods(methods)
		.allow_headers(headers)
}

fn parse_all<T: std::str::FromStr>(kind: &str, values: &[String]) -> Vec<T> {
	values
		.iter()
		.filter_map(|value| match value.parse() {
			Ok(parsed) => Some(parsed),
			Err(_) => {
				tracing::warn!(kind, %value, "Ignoring invalid CORS entry");
				None
			},
		})
		.collect()
}

/// Handles GET /api/health requests.
async fn handle_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"kiosk_id": state.engine.config().kiosk.id,
	}))
}
