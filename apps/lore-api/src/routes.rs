use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use lore_service::{
	Error as ServiceError, IngestRequest, IngestResponse, QueryOutcome, QueryRequest,
};

use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/ingest", post(ingest))
		.route("/v1/query", post(query))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn ingest(
	State(state): State<AppState>,
	Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
	let response = state.service.ingest(payload).await?;
	Ok(Json(response))
}

async fn query(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<QueryBody>,
) -> Result<Response, ApiError> {
	let caller_identity = headers
		.get(USER_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(|value| value.trim().to_string());
	let request = QueryRequest { query: payload.query, caller_identity, top_k: payload.top_k };

	match state.service.query(request).await? {
		QueryOutcome::Answered(response) => Ok(Json(response).into_response()),
		QueryOutcome::Rejected(rejection) =>
			Ok((StatusCode::BAD_REQUEST, Json(rejection)).into_response()),
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			// Provider and storage details stay in the server log.
			ServiceError::Provider { .. } => ApiError::new(
				StatusCode::BAD_GATEWAY,
				"provider_error",
				"Embedding provider request failed.",
			),
			ServiceError::Storage { .. } => ApiError::new(
				StatusCode::SERVICE_UNAVAILABLE,
				"storage_error",
				"Vector storage request failed.",
			),
			ServiceError::Config { message } =>
				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "config_error", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };
		(self.status, Json(body)).into_response()
	}
}
