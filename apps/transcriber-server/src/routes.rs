use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, jobs};
use crate::metrics;
use crate::state::AppState;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
	let api = Router::new()
		.route("/health", get(health::health))
		.route("/version", get(health::version))
		.route("/transcribe", post(jobs::transcribe))
		.route("/progress/:id", get(jobs::progress))
		.route("/queue", get(jobs::queue))
		.route("/clear-completed", post(jobs::clear_completed))
		.route("/clear-all", post(jobs::clear_all))
		.route("/cancel-job/:id", post(jobs::cancel_job))
		.route("/kill-job/:id", post(jobs::kill_job))
		.layer(DefaultBodyLimit::disable())
		.layer(RequestBodyLimitLayer::new(max_upload_bytes));

	let public = Router::new().route("/metrics", get(metrics::metrics_handler));

	Router::new().merge(api).merge(public).with_state(state).layer(
		ServiceBuilder::new()
			.layer(TraceLayer::new_for_http())
			.layer(axum::middleware::from_fn(metrics::metrics_middleware)),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use axum::body::{to_bytes, Body};
	use axum::http::{Request, StatusCode};
	use serde_json::Value;
	use std::path::{Path, PathBuf};
	use std::sync::Arc;
	use std::time::Duration;
	use tokio_util::sync::CancellationToken;
	use tower::ServiceExt;
	use transcribe_queue::*;

	struct EchoBackend;

	#[async_trait]
	impl TranscriptionBackend for EchoBackend {
		async fn transcribe(&self, request: &WorkerRequest, _kill: CancellationToken) -> Result<Transcript, WorkerError> {
			Ok(Transcript {
				text: "hello world".into(),
				segments: vec![Segment {
					start: 0.0,
					end: 1.0,
					text: "hello world".into(),
				}],
				language: request.language.clone(),
			})
		}
	}

	struct OneSecond;

	#[async_trait]
	impl AudioProbe for OneSecond {
		async fn duration(&self, _path: &Path) -> Result<Duration, ProbeError> {
			Ok(Duration::from_secs(1))
		}
	}

	fn engine_config() -> EngineConfig {
		EngineConfig {
			model_path: PathBuf::from("/tmp/model.bin"),
			speed_factor: 1.0,
			progress_tick: Duration::from_millis(10),
			keep_uploads: false,
			event_capacity: 64,
		}
	}

	fn app(upload_dir: &Path, output_dir: &Path) -> (Router, Arc<TranscriptionEngine>) {
		let engine = TranscriptionEngine::new(engine_config(), Arc::new(EchoBackend), Arc::new(OneSecond), Arc::new(FileResultPersister::new(output_dir)));
		let state = AppState::new(engine.clone(), upload_dir.to_path_buf());
		(router(state, 1024 * 1024), engine)
	}

	async fn json(response: axum::response::Response) -> Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	fn multipart(file_name: &str, language: Option<&str>) -> Request<Body> {
		let boundary = "XBOUNDARYX";
		let mut body = format!(
			"--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{file_name}\"\r\nContent-Type: audio/wav\r\n\r\nRIFFDATA\r\n"
		);
		if let Some(language) = language {
			body.push_str(&format!("--{boundary}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\n{language}\r\n"));
		}
		body.push_str(&format!("--{boundary}--\r\n"));

		Request::post("/transcribe")
			.header("content-type", format!("multipart/form-data; boundary={boundary}"))
			.body(Body::from(body))
			.unwrap()
	}

	#[tokio::test]
	async fn health_reports_ok() {
		let dir = tempfile::tempdir().unwrap();
		let (app, _) = app(dir.path(), dir.path());

		let response = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = json(response).await;
		assert_eq!(body["status"], "ok");
		assert!(body["device"].as_str().is_some_and(|d| !d.is_empty()));
	}

	#[tokio::test]
	async fn upload_runs_to_completion() {
		let uploads = tempfile::tempdir().unwrap();
		let outputs = tempfile::tempdir().unwrap();
		let (app, engine) = app(uploads.path(), outputs.path());
		let shutdown = CancellationToken::new();
		let processor = engine.spawn(shutdown.clone());
		let mut events = engine.subscribe();

		let response = app.clone().oneshot(multipart("meeting.wav", Some("en"))).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = json(response).await;
		assert_eq!(body["status"], "queued");
		let job_id = body["job_id"].as_str().unwrap().to_string();

		tokio::time::timeout(Duration::from_secs(5), async {
			loop {
				let event = events.recv().await.unwrap();
				if event.job_id.to_string() == job_id && event.kind == JobEventKind::Completed {
					break;
				}
			}
		})
		.await
		.unwrap();

		let response = app.clone().oneshot(Request::get(format!("/progress/{job_id}")).body(Body::empty()).unwrap()).await.unwrap();
		let body = json(response).await;
		assert_eq!(body["status"], "completed");
		assert_eq!(body["progress"], 100.0);
		assert_eq!(body["result"]["text"], "hello world");
		assert_eq!(body["result"]["language"], "en");
		assert!(body.get("error").is_none());

		let short = job_id.parse::<JobId>().unwrap().short();
		assert!(outputs.path().join(format!("meeting-{short}.srt")).exists());
		assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);

		let response = app.clone().oneshot(Request::get("/queue").body(Body::empty()).unwrap()).await.unwrap();
		let body = json(response).await;
		assert_eq!(body["count"], 0);
		assert_eq!(body["completed"].as_array().unwrap().len(), 1);
		let listed = &body["completed"][0];
		assert_eq!(listed["id"], job_id.as_str());
		assert_eq!(listed["queue_position"], 0);
		assert_eq!(listed["result"]["text"], "hello world");
		assert!(listed.get("audioPath").is_none() && listed.get("audio_path").is_none());

		let response = app.oneshot(Request::post("/clear-completed").body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(json(response).await["status"], "cleared");
		assert!(engine.list_queue().await.finished.is_empty());

		shutdown.cancel();
		processor.await.unwrap();
	}

	#[tokio::test]
	async fn upload_without_audio_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let (app, _) = app(dir.path(), dir.path());

		let boundary = "XBOUNDARYX";
		let body = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\nen\r\n--{boundary}--\r\n");
		let request = Request::post("/transcribe")
			.header("content-type", format!("multipart/form-data; boundary={boundary}"))
			.body(Body::from(body))
			.unwrap();

		let response = app.oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(json(response).await["error"], "No audio file provided");
	}

	#[tokio::test]
	async fn unknown_job_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let (app, _) = app(dir.path(), dir.path());

		let response = app.clone().oneshot(Request::get(format!("/progress/{}", JobId::new())).body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(json(response).await["error"], "Job not found");

		let response = app.clone().oneshot(Request::get("/progress/not-a-uuid").body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn cancel_and_kill_map_engine_errors() {
		let dir = tempfile::tempdir().unwrap();
		let (app, engine) = app(dir.path(), dir.path());

		// scheduler not running, so the job stays queued
		let response = app.clone().oneshot(multipart("a.wav", None)).await.unwrap();
		let job_id = json(response).await["job_id"].as_str().unwrap().to_string();
		let parsed: JobId = job_id.parse().unwrap();
		assert_eq!(engine.get_job(&parsed).await.unwrap().language, "auto");

		let response = app.clone().oneshot(Request::post(format!("/kill-job/{job_id}")).body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(json(response).await["error"].as_str().unwrap().starts_with("Failed to kill job"));

		let response = app.clone().oneshot(Request::post(format!("/cancel-job/{job_id}")).body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = json(response).await;
		assert_eq!(body["status"], "cancelled");
		assert_eq!(body["jobId"], job_id);

		let response = app.oneshot(Request::post(format!("/cancel-job/{job_id}")).body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(json(response).await["error"], format!("Job {job_id} not found in queue"));
	}
}
