//! API types for the kiosk HTTP surface.
//!
//! Request bodies, query strings and the error response shape shared by every
//! endpoint.

use crate::{ItemRequest, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	pub customer_id: i64,
}

/// Body of `PATCH /orders/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
	#[serde(default)]
	pub customer_id: Option<i64>,
	#[serde(default)]
	pub status: Option<OrderStatus>,
	#[serde(default)]
	pub staff_id: Option<i64>,
}

/// Body of `PUT /orders/{id}/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetItemsRequest {
	pub items: Vec<ItemRequest>,
}

/// Query string of `GET /orders`.
///
/// `status` and `status_exclude` are comma separated status lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
	pub customer_id: Option<i64>,
	pub status: Option<String>,
	pub status_exclude: Option<String>,
	pub sort: Option<String>,
	pub page: Option<usize>,
	pub limit: Option<usize>,
}

/// Query string of `GET /orders/{id}/history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListHistoryQuery {
	pub status: Option<String>,
	pub page: Option<usize>,
	pub limit: Option<usize>,
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
	pub order_id: i64,
}

/// Query form of the webhook, as sent by providers that notify with `?id=&topic=`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookQuery {
	pub id: Option<String>,
	pub topic: Option<String>,
}

/// Body of `PUT /products/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertProductRequest {
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub category: String,
	pub price: Decimal,
}

/// Parses a comma separated status list. Blank entries are skipped.
pub fn parse_status_list(raw: Option<&str>) -> Vec<OrderStatus> {
	raw.map(|raw| {
		raw.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(OrderStatus::parse)
			.collect()
	})
	.unwrap_or_default()
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error code, e.g. `NOT_FOUND`.
	pub error: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// API error with its HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// 400
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// 404
	NotFound { error_type: String, message: String },
	/// 500
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: "INVALID_INPUT".to_string(),
			message: message.into(),
			details: None,
		}
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		APIError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message: message.into(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL".to_string(),
			message: message.into(),
		}
	}

	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::InternalServerError { .. } => 500,
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_error_response())).into_response()
	}
}
