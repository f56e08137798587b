use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
	status: &'static str,
	device: String,
}

#[derive(Serialize)]
pub struct VersionResponse {
	version: &'static str,
}

#[instrument(name = "health", skip_all)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok",
		device: state.device.to_string(),
	})
}

pub async fn version() -> Json<VersionResponse> {
	Json(VersionResponse {
		version: env!("CARGO_PKG_VERSION"),
	})
}
