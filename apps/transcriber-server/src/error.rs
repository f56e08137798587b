use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use transcribe_queue::EngineError;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
	#[error("Job not found")]
	JobNotFound,

	#[error("Invalid job id: {0}")]
	InvalidJobId(String),

	#[error("No audio file provided")]
	MissingAudio,

	#[error("Failed to parse upload: {0}")]
	Upload(#[from] axum::extract::multipart::MultipartError),

	#[error("Failed to save file")]
	SaveFailed(#[source] std::io::Error),

	#[error("{0}")]
	Cancel(EngineError),

	#[error("Failed to kill job: {0}")]
	Kill(EngineError),

	#[error("{0}")]
	Engine(#[from] EngineError),
}

impl ApiError {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::JobNotFound => StatusCode::NOT_FOUND,
			Self::InvalidJobId(_) | Self::MissingAudio | Self::Upload(_) | Self::Cancel(_) => StatusCode::BAD_REQUEST,
			Self::SaveFailed(_) | Self::Kill(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		match &self {
			Self::SaveFailed(e) => tracing::error!(error = %e, "Failed to save upload"),
			Self::Kill(e) => tracing::warn!(error = %e, "Kill request rejected"),
			_ if status.is_server_error() => tracing::error!(error = %self, "Request failed"),
			_ => tracing::debug!(error = %self, "Request rejected"),
		}

		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use transcribe_queue::JobId;

	#[test]
	fn status_codes_follow_route_contract() {
		let id = JobId::new();
		assert_eq!(ApiError::JobNotFound.status_code(), StatusCode::NOT_FOUND);
		assert_eq!(ApiError::MissingAudio.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(ApiError::Cancel(EngineError::NotInQueue(id)).status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(ApiError::Kill(EngineError::NotRunning(id)).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(ApiError::Engine(EngineError::DuplicateJob(id)).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn messages_match_clients_expectations() {
		let id = JobId::new();
		assert_eq!(ApiError::Cancel(EngineError::NotInQueue(id)).to_string(), format!("Job {id} not found in queue"));
		assert_eq!(ApiError::Kill(EngineError::NotRunning(id)).to_string(), format!("Failed to kill job: Job {id} is not running"));
	}
}
