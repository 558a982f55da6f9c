//! HTTP server for the Tumble API.
//!
//! This module exposes the customer ordering flow and the operator
//! workflow over JSON endpoints. Handlers are thin: they validate the
//! request shape, call into the engine, and map engine errors onto HTTP
//! statuses.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use serde::{Deserialize, Serialize};
use tumble_config::ApiConfig;
use tumble_core::{EngineError, FulfillmentEngine};
use tumble_intake::{Coordinates, NewOrder, PaymentOutcome};
use tumble_types::{Order, OrderStatus, PhotoRef, PickupType, ServiceType, StepNumber};
use tumble_workflow::{StepDefinition, StepEvidence};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use validator::Validate;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the fulfillment engine for processing requests.
	pub engine: Arc<FulfillmentEngine>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<FulfillmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/confirm-payment", post(handle_confirm_payment))
				.route("/orders/{id}/claim", post(handle_claim))
				.route("/orders/{id}/cancel", post(handle_cancel))
				.route("/orders/{id}/steps/{n}", post(handle_complete_step))
				.route("/orders/{id}/steps/{n}/photo", post(handle_upload_photo))
				.route("/steps", get(handle_get_steps)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Tumble API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// API error carrying an HTTP status and a JSON body.
#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}

impl ApiError {
	fn unprocessable(message: impl Into<String>) -> Self {
		Self {
			status: StatusCode::UNPROCESSABLE_ENTITY,
			message: message.into(),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = Json(serde_json::json!({ "error": self.message }));
		(self.status, body).into_response()
	}
}

impl From<EngineError> for ApiError {
	fn from(err: EngineError) -> Self {
		let status = match &err {
			EngineError::OrderNotFound(_) => StatusCode::NOT_FOUND,
			EngineError::OrderUnavailable
			| EngineError::LimitReached
			| EngineError::StepOutOfOrder { .. } => StatusCode::CONFLICT,
			EngineError::NotOrderOperator { .. } => StatusCode::FORBIDDEN,
			EngineError::Workflow(_) | EngineError::PhotoNotStored => {
				StatusCode::UNPROCESSABLE_ENTITY
			}
			EngineError::Intake(tumble_intake::IntakeError::Validation(_)) => {
				StatusCode::UNPROCESSABLE_ENTITY
			}
			EngineError::Intake(_) | EngineError::Media(_) => StatusCode::BAD_GATEWAY,
			EngineError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
			EngineError::Config(_) | EngineError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		Self {
			status,
			message: err.to_string(),
		}
	}
}

/// Request body for POST /api/orders.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	#[validate(length(min = 1))]
	pub customer_id: String,
	pub pickup_type: PickupType,
	pub service_type: ServiceType,
	#[serde(default)]
	pub is_express: bool,
	#[validate(range(min = 1, max = 20))]
	pub bag_estimate: u32,
	#[serde(default)]
	pub discount_cents: u64,
	#[validate(length(min = 1))]
	pub pickup_address: String,
	#[serde(default)]
	pub delivery_address: Option<String>,
	#[validate(length(min = 3, max = 10))]
	pub zip_code: String,
	#[serde(default)]
	pub locker_id: Option<String>,
}

impl From<CreateOrderRequest> for NewOrder {
	fn from(request: CreateOrderRequest) -> Self {
		NewOrder {
			customer_id: request.customer_id,
			pickup_type: request.pickup_type,
			service_type: request.service_type,
			is_express: request.is_express,
			bag_estimate: request.bag_estimate,
			discount_cents: request.discount_cents,
			pickup_address: request.pickup_address,
			delivery_address: request.delivery_address,
			zip_code: request.zip_code,
			locker_id: request.locker_id,
		}
	}
}

/// Order snapshot for API responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
	pub id: String,
	pub order_number: String,
	pub status: OrderStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_step: Option<u8>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub washer_id: Option<String>,
	pub pickup_type: PickupType,
	pub service_type: ServiceType,
	pub is_express: bool,
	pub step_photos: BTreeMap<u8, PhotoRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bag_count: Option<u32>,
	pub total_amount_cents: u64,
	pub discount_amount_cents: u64,
	pub business_cut_cents: u64,
	pub operator_payout_cents: u64,
	pub created_at: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub claimed_at: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<u64>,
	pub pickup_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_address: Option<String>,
	pub zip_code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locker_id: Option<String>,
}

impl OrderResponse {
	fn from_order(order: &Order) -> Self {
		Self {
			id: order.id.clone(),
			order_number: order.order_number(),
			status: order.status(),
			current_step: order.current_step().map(|s| s.get()),
			washer_id: order.washer_id.clone(),
			pickup_type: order.pickup_type,
			service_type: order.service_type,
			is_express: order.is_express,
			step_photos: order.step_photos.clone(),
			bag_count: order.bag_count,
			total_amount_cents: order.total_amount_cents,
			discount_amount_cents: order.discount_amount_cents,
			business_cut_cents: order.business_cut_cents,
			operator_payout_cents: order.operator_payout_cents,
			created_at: order.created_at,
			claimed_at: order.claimed_at,
			completed_at: order.completed_at,
			pickup_address: order.pickup_address.clone(),
			delivery_address: order.delivery_address.clone(),
			zip_code: order.zip_code.clone(),
			locker_id: order.locker_id.clone(),
		}
	}
}

/// Response body for POST /api/orders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
	pub order: OrderResponse,
	pub payment: PaymentOutcome,
	pub pickup_coordinates: Coordinates,
}

/// Request body for POST /api/orders/{id}/claim.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
	#[validate(length(min = 1))]
	pub washer_id: String,
}

/// Request body for POST /api/orders/{id}/steps/{n}.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
	#[validate(length(min = 1))]
	pub washer_id: String,
	#[serde(default)]
	pub evidence: Option<StepEvidence>,
}

/// Request body for POST /api/orders/{id}/steps/{n}/photo.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPhotoRequest {
	/// Hex-encoded image bytes.
	pub bytes_hex: String,
}

/// Request body for POST /api/orders/{id}/cancel.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
	#[serde(default = "default_cancel_reason")]
	pub reason: String,
}

fn default_cancel_reason() -> String {
	"cancelled by support".to_string()
}

fn parse_step(n: u8) -> Result<StepNumber, ApiError> {
	StepNumber::new(n)
		.ok_or_else(|| ApiError::unprocessable(format!("step number {} out of range 1..=13", n)))
}

/// Handles POST /api/orders requests (customer ordering flow).
async fn handle_create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
	request
		.validate()
		.map_err(|e| ApiError::unprocessable(e.to_string()))?;

	let placed = state.engine.place_order(request.into()).await?;
	Ok(Json(CreateOrderResponse {
		order: OrderResponse::from_order(&placed.order),
		payment: placed.payment,
		pickup_coordinates: placed.pickup_coordinates,
	}))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, ApiError> {
	let order = state.engine.get_order(&id).await?;
	Ok(Json(OrderResponse::from_order(&order)))
}

/// Handles POST /api/orders/{id}/confirm-payment requests.
async fn handle_confirm_payment(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, ApiError> {
	let order = state.engine.confirm_payment(&id).await?;
	Ok(Json(OrderResponse::from_order(&order)))
}

/// Handles POST /api/orders/{id}/claim requests (operator flow).
async fn handle_claim(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ClaimRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
	request
		.validate()
		.map_err(|e| ApiError::unprocessable(e.to_string()))?;

	let order = state.engine.claim(&id, &request.washer_id).await?;
	Ok(Json(OrderResponse::from_order(&order)))
}

/// Handles POST /api/orders/{id}/cancel requests.
async fn handle_cancel(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
	let order = state.engine.cancel_order(&id, &request.reason).await?;
	Ok(Json(OrderResponse::from_order(&order)))
}

/// Handles POST /api/orders/{id}/steps/{n}/photo requests.
///
/// Stores the uploaded image and returns its content-addressed
/// reference; the client attaches the reference to the step completion.
async fn handle_upload_photo(
	Path((_id, n)): Path<(String, u8)>,
	State(state): State<AppState>,
	Json(request): Json<UploadPhotoRequest>,
) -> Result<Json<PhotoRef>, ApiError> {
	parse_step(n)?;

	let bytes = hex::decode(request.bytes_hex.trim())
		.map_err(|e| ApiError::unprocessable(format!("bytesHex is not valid hex: {}", e)))?;

	let photo = state.engine.store_photo(&bytes).await?;
	Ok(Json(photo))
}

/// Handles POST /api/orders/{id}/steps/{n} requests (step completion).
async fn handle_complete_step(
	Path((id, n)): Path<(String, u8)>,
	State(state): State<AppState>,
	Json(request): Json<CompleteStepRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
	request
		.validate()
		.map_err(|e| ApiError::unprocessable(e.to_string()))?;

	let step = parse_step(n)?;
	let evidence = request.evidence.unwrap_or(StepEvidence::None);
	let outcome = state
		.engine
		.complete_step(&id, &request.washer_id, step, evidence)
		.await?;

	Ok(Json(OrderResponse::from_order(outcome.order())))
}

/// Handles GET /api/steps requests: the canonical checklist.
async fn handle_get_steps() -> Json<&'static [StepDefinition]> {
	Json(tumble_workflow::steps())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_engine_errors_map_to_statuses() {
		let cases = [
			(
				EngineError::OrderNotFound("o1".into()),
				StatusCode::NOT_FOUND,
			),
			(EngineError::OrderUnavailable, StatusCode::CONFLICT),
			(EngineError::LimitReached, StatusCode::CONFLICT),
			(
				EngineError::NotOrderOperator {
					order_id: "o1".into(),
					washer_id: "w1".into(),
				},
				StatusCode::FORBIDDEN,
			),
			(
				EngineError::StepOutOfOrder {
					requested: 5,
					current: 2,
				},
				StatusCode::CONFLICT,
			),
			(EngineError::PhotoNotStored, StatusCode::UNPROCESSABLE_ENTITY),
			(
				EngineError::Contention("o1".into()),
				StatusCode::SERVICE_UNAVAILABLE,
			),
		];

		for (err, expected) in cases {
			assert_eq!(ApiError::from(err).status, expected);
		}
	}

	#[test]
	fn test_create_order_request_validation() {
		let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
			"customerId": "cust-1",
			"pickupType": "pickup_delivery",
			"serviceType": "wash_fold",
			"bagEstimate": 0,
			"pickupAddress": "12 Spring St",
			"zipCode": "07030"
		}))
		.unwrap();
		assert!(request.validate().is_err());
	}

	#[test]
	fn test_step_evidence_wire_format() {
		let evidence: StepEvidence =
			serde_json::from_str(r#"{"kind": "bag_count", "count": 2}"#).unwrap();
		assert_eq!(evidence.bag_count(), Some(2));

		let evidence: StepEvidence = serde_json::from_str(
			r#"{"kind": "photo", "photo": {"digest": "abc", "size_bytes": 10}}"#,
		)
		.unwrap();
		assert!(evidence.photo().is_some());
	}
}
