use axum::{
	body::Body,
	extract::MatchedPath,
	http::{Request, Response, StatusCode},
	middleware::Next,
};
use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transcribe_queue::{JobEvent, JobEventKind, TranscriptionEngine};

lazy_static! {
	static ref HTTP_REQUESTS_TOTAL: IntCounterVec =
		register_int_counter_vec!("http_requests_total", "Total number of HTTP requests", &["method", "route", "status"]).expect("Failed to register HTTP_REQUESTS_TOTAL");
	static ref HTTP_REQUEST_DURATION: HistogramVec =
		register_histogram_vec!("http_request_duration_seconds", "HTTP request duration in seconds", &["method", "route"]).expect("Failed to register HTTP_REQUEST_DURATION");
	static ref JOB_EVENTS_TOTAL: IntCounterVec =
		register_int_counter_vec!("transcription_job_events_total", "Job lifecycle transitions by kind", &["kind"]).expect("Failed to register JOB_EVENTS_TOTAL");
	static ref QUEUE_DEPTH: IntGauge = register_int_gauge!("transcription_queue_depth", "Jobs waiting or running").expect("Failed to register QUEUE_DEPTH");
}

/// Middleware for Prometheus metrics collection
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response<Body> {
	let method = req.method().to_string();
	// label by route template so job ids do not explode cardinality
	let route = req.extensions().get::<MatchedPath>().map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string());

	let start = Instant::now();
	let response = next.run(req).await;
	let duration = start.elapsed().as_secs_f64();

	let status = response.status().as_u16().to_string();

	HTTP_REQUESTS_TOTAL.with_label_values(&[&method, &route, &status]).inc();
	HTTP_REQUEST_DURATION.with_label_values(&[&method, &route]).observe(duration);

	response
}

/// Prometheus metrics handler
pub async fn metrics_handler() -> Result<String, StatusCode> {
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();
	let mut buffer = Vec::new();

	if encoder.encode(&metric_families, &mut buffer).is_err() {
		return Err(StatusCode::INTERNAL_SERVER_ERROR);
	}

	String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn record_event(event: &JobEvent) {
	JOB_EVENTS_TOTAL.with_label_values(&[event.kind.as_str()]).inc();
}

/// Follow the engine's event stream until shutdown, keeping job counters and
/// the queue depth gauge current
pub fn spawn_event_listener(engine: Arc<TranscriptionEngine>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
	let mut events = engine.subscribe();

	tokio::spawn(async move {
		info!("📈 Job metrics listener started");
		loop {
			let event = tokio::select! {
				() = shutdown.cancelled() => break,
				event = events.recv() => event,
			};

			match event {
				Ok(event) => {
					record_event(&event);
					if event.kind != JobEventKind::Started {
						QUEUE_DEPTH.set(i64::try_from(engine.pending_len().await).unwrap_or(i64::MAX));
					}
					debug!(job_id = %event.job_id, kind = event.kind.as_str(), "Job event");
				}
				Err(RecvError::Lagged(skipped)) => warn!(skipped, "⚠️ Metrics listener lagged behind job events"),
				Err(RecvError::Closed) => break,
			}
		}
		info!("📈 Job metrics listener stopped");
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use transcribe_queue::JobId;

	#[tokio::test]
	async fn events_show_up_in_exposition() {
		record_event(&JobEvent::new(JobId::new(), JobEventKind::Killed));

		let body = metrics_handler().await.unwrap();
		assert!(body.contains("transcription_job_events_total{kind=\"killed\"}"));
	}
}
