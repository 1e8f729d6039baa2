//! Payment provider notifications.
//!
//! Providers either post `{ "resource": .., "topic": .. }` or call the URL
//! with `?id=..&topic=..` and an unrelated body. Query values win.

use super::reject;
use crate::server::AppState;
use axum::{
	body::Bytes,
	extract::{Query, State},
	response::Json,
};
use kiosk_types::{APIError, Payment, WebhookNotification, WebhookQuery};

/// Handles POST /api/webhooks/payments.
pub async fn handle_payment_notification(
	State(state): State<AppState>,
	Query(query): Query<WebhookQuery>,
	body: Bytes,
) -> Result<Json<Payment>, APIError> {
	let notification = resolve_notification(query, &body)?;
	tracing::info!(
		resource = %notification.resource,
		topic = %notification.topic,
		"Payment notification received"
	);

	let payment = state
		.engine
		.payments()
		.update(&notification.resource, &notification.topic)
		.await
		.map_err(reject)?;
	Ok(Json(payment))
}

fn resolve_notification(query: WebhookQuery, body: &[u8]) -> Result<WebhookNotification, APIError> {
	if let Some(id) = query.id.filter(|id| !id.trim().is_empty()) {
		return Ok(WebhookNotification {
			resource: id,
			topic: query.topic.unwrap_or_default(),
		});
	}

	let notification: WebhookNotification = serde_json::from_slice(body)
		.map_err(|e| APIError::bad_request(format!("invalid notification: {}", e)))?;
	if notification.resource.trim().is_empty() {
		return Err(APIError::bad_request("notification resource is mandatory"));
	}
	Ok(notification)
}
