use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};
use transcribe_queue::{Job, JobId, JobStatus, Transcript};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SubmitResponse {
	job_id: JobId,
	status: JobStatus,
}

/// Client view of a job, shared by `/progress` and `/queue`. Server-side
/// paths stay private.
#[derive(Serialize)]
pub struct JobView {
	id: JobId,
	file_name: String,
	language: String,
	status: JobStatus,
	progress: f64,
	message: String,
	eta: String,
	queue_position: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	result: Option<Transcript>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

impl From<Job> for JobView {
	fn from(job: Job) -> Self {
		let result = if job.status == JobStatus::Completed { job.result } else { None };
		let error = if job.status == JobStatus::Failed { job.error } else { None };
		Self {
			id: job.id,
			file_name: job.file_name,
			language: job.language,
			status: job.status,
			progress: job.progress,
			message: job.message,
			eta: job.eta,
			queue_position: job.queue_position,
			result,
			error,
		}
	}
}

#[derive(Serialize)]
pub struct QueueResponse {
	queue: Vec<JobView>,
	completed: Vec<JobView>,
	count: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
	status: &'static str,
}

#[derive(Serialize)]
pub struct JobActionResponse {
	status: &'static str,
	#[serde(rename = "jobId")]
	job_id: JobId,
}

/// Accept a multipart upload (`audio` file, optional `language`) and queue it
#[instrument(name = "transcribe", skip_all)]
pub async fn transcribe(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<SubmitResponse>, ApiError> {
	let mut upload: Option<(String, PathBuf)> = None;
	let mut language: Option<String> = None;

	while let Some(mut field) = multipart.next_field().await? {
		let name = field.name().unwrap_or_default().to_string();
		match name.as_str() {
			"audio" if upload.is_none() => {
				let file_name = field.file_name().unwrap_or("audio").to_string();
				let path = state.upload_dir.join(upload_file_name(&file_name));

				if let Err(e) = save_field(&mut field, &path).await {
					let _ = tokio::fs::remove_file(&path).await;
					return Err(e);
				}
				upload = Some((file_name, path));
			}
			"language" => language = Some(field.text().await?),
			_ => {}
		}
	}

	let Some((file_name, path)) = upload else {
		return Err(ApiError::MissingAudio);
	};
	let language = language.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).unwrap_or_else(|| "auto".to_string());

	let job_id = match state.engine.submit(file_name.as_str(), path.as_path(), language.as_str()).await {
		Ok(id) => id,
		Err(e) => {
			let _ = tokio::fs::remove_file(&path).await;
			return Err(e.into());
		}
	};

	info!(%job_id, %file_name, %language, "📤 Upload accepted");
	Ok(Json(SubmitResponse {
		job_id,
		status: JobStatus::Queued,
	}))
}

pub async fn progress(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<JobView>, ApiError> {
	let job_id: JobId = id.parse().map_err(|_| ApiError::JobNotFound)?;
	let job = state.engine.get_job(&job_id).await.ok_or(ApiError::JobNotFound)?;
	Ok(Json(job.into()))
}

pub async fn queue(State(state): State<AppState>) -> Json<QueueResponse> {
	let listing = state.engine.list_queue().await;
	Json(QueueResponse {
		count: listing.pending.len(),
		queue: listing.pending.into_iter().map(JobView::from).collect(),
		completed: listing.finished.into_iter().map(JobView::from).collect(),
	})
}

pub async fn clear_completed(State(state): State<AppState>) -> Json<StatusResponse> {
	state.engine.clear_completed().await;
	Json(StatusResponse { status: "cleared" })
}

pub async fn clear_all(State(state): State<AppState>) -> Json<StatusResponse> {
	state.engine.clear_all().await;
	Json(StatusResponse { status: "cleared" })
}

pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<JobActionResponse>, ApiError> {
	let job_id: JobId = id.parse().map_err(|_| ApiError::InvalidJobId(id))?;
	state.engine.cancel(job_id).await.map_err(ApiError::Cancel)?;
	Ok(Json(JobActionResponse { status: "cancelled", job_id }))
}

pub async fn kill_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<JobActionResponse>, ApiError> {
	let job_id: JobId = id.parse().map_err(|_| ApiError::InvalidJobId(id))?;
	warn!(%job_id, "🔪 Force killing job, terminating worker process");
	state.engine.kill(job_id).await.map_err(ApiError::Kill)?;
	Ok(Json(JobActionResponse { status: "killed", job_id }))
}

async fn save_field(field: &mut axum::extract::multipart::Field<'_>, path: &std::path::Path) -> Result<(), ApiError> {
	let mut file = tokio::fs::File::create(path).await.map_err(ApiError::SaveFailed)?;
	while let Some(chunk) = field.chunk().await? {
		file.write_all(&chunk).await.map_err(ApiError::SaveFailed)?;
	}
	file.flush().await.map_err(ApiError::SaveFailed)?;
	Ok(())
}

/// `<uuid><.ext>` keeping the client's extension when it is plain
fn upload_file_name(client_name: &str) -> String {
	let extension = std::path::Path::new(client_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
		.map(|ext| format!(".{}", ext.to_ascii_lowercase()))
		.unwrap_or_default();
	format!("{}{extension}", Uuid::new_v4())
}
