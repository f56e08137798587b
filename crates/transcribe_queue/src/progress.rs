use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancellation::CancellationSet;
use crate::job::{JobId, MAX_ESTIMATED_PROGRESS};
use crate::registry::JobRegistry;

/// Real-time factor of the backend on this platform. Heuristic, not measured.
#[must_use]
pub fn default_speed_factor() -> f64 {
	if cfg!(all(target_arch = "aarch64", target_os = "macos")) {
		6.0
	} else {
		1.5
	}
}

/// How long transcribing `audio` should take at `speed_factor` times real time
#[must_use]
pub fn expected_duration(audio: Duration, speed_factor: f64) -> Duration {
	if speed_factor <= 0.0 || !speed_factor.is_finite() {
		return audio;
	}
	Duration::from_secs_f64(audio.as_secs_f64() / speed_factor)
}

/// Percentage of `expected` covered by `elapsed`, capped below completion
#[must_use]
pub fn estimate(elapsed: Duration, expected: Duration) -> f64 {
	if expected.is_zero() {
		return MAX_ESTIMATED_PROGRESS;
	}
	(elapsed.as_secs_f64() / expected.as_secs_f64() * 100.0).min(MAX_ESTIMATED_PROGRESS)
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_eta(remaining_secs: f64) -> String {
	if remaining_secs < 0.0 || !remaining_secs.is_finite() {
		return "Almost done...".to_string();
	}

	let total = remaining_secs as u64;
	let hours = total / 3600;
	let minutes = (total / 60) % 60;
	let seconds = total % 60;

	if hours > 0 {
		format!("{hours}h {minutes}m remaining")
	} else if minutes > 0 {
		format!("{minutes}m {seconds}s remaining")
	} else {
		format!("{seconds}s remaining")
	}
}

/// Background ticker for the job currently being transcribed
pub(crate) struct ProgressEstimator {
	stop: CancellationToken,
	task: JoinHandle<()>,
}

impl ProgressEstimator {
	pub fn spawn(registry: Arc<JobRegistry>, cancellations: Arc<CancellationSet>, job_id: JobId, expected: Duration, tick: Duration) -> Self {
		let stop = CancellationToken::new();
		let task = tokio::spawn(tick_loop(registry, cancellations, job_id, expected, tick, stop.clone()));
		Self { stop, task }
	}

	/// Stop ticking and wait until no further update can land
	pub async fn stop(self) {
		self.stop.cancel();
		let _ = self.task.await;
	}
}

async fn tick_loop(registry: Arc<JobRegistry>, cancellations: Arc<CancellationSet>, job_id: JobId, expected: Duration, tick: Duration, stop: CancellationToken) {
	let started = Instant::now();
	let mut ticker = interval_at(started + tick, tick);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			() = stop.cancelled() => break,
			_ = ticker.tick() => {}
		}

		if cancellations.contains(&job_id).await {
			debug!(%job_id, "Estimator stopping, job cancelled");
			break;
		}

		let elapsed = started.elapsed();
		let progress = estimate(elapsed, expected);
		let eta = format_eta(expected.as_secs_f64() - elapsed.as_secs_f64());
		let message = format!("Transcribing... {progress:.0}%");

		let applied = registry.update(&job_id, |job| job.report_progress(progress, message, eta)).await;
		if applied != Some(true) {
			debug!(%job_id, "Estimator stopping, job no longer active");
			break;
		}
	}
}
