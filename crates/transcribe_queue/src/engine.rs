use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cancellation::{CancelReason, CancellationSet};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{JobEvent, JobEventKind};
use crate::job::{Job, JobId, JobStatus, Transcript};
use crate::persist::ResultPersister;
use crate::probe::AudioProbe;
use crate::progress::{self, ProgressEstimator};
use crate::queue::{PendingIds, PendingQueue};
use crate::registry::{JobRegistry, JobTable};
use crate::worker::{ActiveWorker, TranscriptionBackend, WorkerRequest};

/// Jobs split by pending-queue membership
#[derive(Debug, Clone, Default)]
pub struct QueueListing {
	/// In queue order; the head is the job being processed, if any
	pub pending: Vec<Job>,
	/// Everything else, sorted by id
	pub finished: Vec<Job>,
}

/// Owns job state and runs jobs one at a time through the worker backend.
///
/// Lock order, whenever more than one is held:
/// registry -> pending queue -> cancellation set -> active worker.
/// Every other path takes these locks one at a time.
pub struct TranscriptionEngine {
	config: EngineConfig,
	registry: Arc<JobRegistry>,
	queue: PendingQueue,
	cancellations: Arc<CancellationSet>,
	active: ActiveWorker,
	wake: Notify,
	running: AtomicBool,
	events: broadcast::Sender<JobEvent>,
	backend: Arc<dyn TranscriptionBackend>,
	probe: Arc<dyn AudioProbe>,
	persister: Arc<dyn ResultPersister>,
}

impl TranscriptionEngine {
	pub fn new(config: EngineConfig, backend: Arc<dyn TranscriptionBackend>, probe: Arc<dyn AudioProbe>, persister: Arc<dyn ResultPersister>) -> Arc<Self> {
		let (events, _) = broadcast::channel(config.event_capacity.max(1));
		Arc::new(Self {
			config,
			registry: Arc::new(JobRegistry::new()),
			queue: PendingQueue::default(),
			cancellations: Arc::new(CancellationSet::new()),
			active: ActiveWorker::new(),
			wake: Notify::new(),
			running: AtomicBool::new(false),
			events,
			backend,
			probe,
			persister,
		})
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
		self.events.subscribe()
	}

	/// Start the processing loop. It runs until `shutdown` is cancelled; a job
	/// in flight at that point has its worker killed.
	pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
		let engine = Arc::clone(self);
		tokio::spawn(async move { engine.run(shutdown).await })
	}

	/// Register a new job at the back of the queue
	pub async fn submit(&self, file_name: impl Into<String>, audio_path: impl Into<PathBuf>, language: impl Into<String>) -> Result<JobId, EngineError> {
		let job = Job::new(JobId::new(), file_name, audio_path, language);
		let job_id = job.id;
		let file_name = job.file_name.clone();

		{
			let mut jobs = self.registry.write().await;
			jobs.create(job)?;
			let mut queue = self.queue.lock().await;
			queue.push(job_id);
			self.refresh_positions(&mut jobs, &queue);
		}

		info!(%job_id, %file_name, "📥 Job queued");
		self.emit(job_id, JobEventKind::Submitted);
		self.wake.notify_one();
		Ok(job_id)
	}

	pub async fn get_job(&self, job_id: &JobId) -> Option<Job> {
		self.registry.get(job_id).await
	}

	pub async fn list_queue(&self) -> QueueListing {
		let jobs = self.registry.read().await;
		let queue = self.queue.lock().await;

		let pending: Vec<Job> = queue.iter().filter_map(|id| jobs.get(id).cloned()).collect();
		let queued: HashSet<&JobId> = queue.iter().collect();
		let mut finished: Vec<Job> = jobs.values().filter(|job| !queued.contains(&job.id)).cloned().collect();
		finished.sort_by_key(|job| job.id);

		QueueListing { pending, finished }
	}

	pub async fn pending_len(&self) -> usize {
		self.queue.len().await
	}

	/// Id of the job whose worker is currently running
	pub async fn active_job(&self) -> Option<JobId> {
		self.active.current().await
	}

	/// Cancel a job that is still in the pending queue.
	///
	/// A job that has not started is removed and failed right away. For the
	/// job already running this only records the intent; the scheduler fails
	/// it once the worker returns.
	pub async fn cancel(&self, job_id: JobId) -> Result<(), EngineError> {
		let removed = {
			let mut jobs = self.registry.write().await;
			let mut queue = self.queue.lock().await;
			if !queue.contains(&job_id) {
				return Err(EngineError::NotInQueue(job_id));
			}

			self.cancellations.mark(job_id, CancelReason::Cancelled).await;

			if self.active.is(&job_id).await {
				if let Some(job) = jobs.get_mut(&job_id) {
					job.annotate("Cancelling after the current step...");
				}
				None
			} else {
				queue.remove(&job_id);
				let job = jobs.get_mut(&job_id).and_then(|job| job.fail(CancelReason::Cancelled.message()).then(|| job.clone()));
				self.refresh_positions(&mut jobs, &queue);
				job
			}
		};

		match removed {
			Some(job) => {
				info!(%job_id, "🚫 Job cancelled before start");
				self.remove_upload(&job.audio_path).await;
				self.emit(job_id, JobEventKind::Cancelled);
				self.wake.notify_one();
			}
			None => info!(%job_id, "🚫 Cancellation flagged for running job"),
		}

		Ok(())
	}

	/// Force-stop the running job by killing its worker process.
	///
	/// A rejected kill leaves the job untouched. The set stays locked from the
	/// slot check to the mark, and the scheduler reads marks only after it has
	/// cleared the slot, so it sees the mark exactly when the kill landed.
	pub async fn kill(&self, job_id: JobId) -> Result<(), EngineError> {
		{
			let mut marks = self.cancellations.lock().await;
			if !self.active.kill(&job_id).await {
				return Err(EngineError::NotRunning(job_id));
			}
			marks.entry(job_id).or_insert(CancelReason::Killed);
		}

		warn!(%job_id, "🔪 Kill requested, terminating worker process");
		Ok(())
	}

	/// Drop finished jobs that are no longer queued. Returns how many were removed.
	pub async fn clear_completed(&self) -> usize {
		let purged = {
			let mut jobs = self.registry.write().await;
			let queue = self.queue.lock().await;
			jobs.purge_where(|job| job.status.is_terminal() && !queue.contains(&job.id))
		};

		for job in &purged {
			self.emit(job.id, JobEventKind::Purged);
		}
		info!(removed = purged.len(), "🧹 Cleared finished jobs");
		purged.len()
	}

	/// Drop every job except the one whose worker is running right now
	pub async fn clear_all(&self) -> usize {
		let purged = {
			let mut jobs = self.registry.write().await;
			let mut queue = self.queue.lock().await;
			let keep = self.active.current().await;

			let purged = jobs.purge_where(|job| Some(job.id) != keep);
			queue.retain(|id| Some(*id) == keep);
			self.refresh_positions(&mut jobs, &queue);
			purged
		};

		for job in &purged {
			if !job.status.is_terminal() {
				self.remove_upload(&job.audio_path).await;
			}
			self.emit(job.id, JobEventKind::Purged);
		}
		info!(removed = purged.len(), "🧹 Cleared all jobs");
		purged.len()
	}

	async fn run(self: Arc<Self>, shutdown: CancellationToken) {
		self.running.store(true, Ordering::SeqCst);
		self.relabel().await;
		info!("🔄 Queue processor started");

		loop {
			if shutdown.is_cancelled() {
				break;
			}

			let Some(job_id) = self.queue.front().await else {
				tokio::select! {
					() = shutdown.cancelled() => break,
					() = self.wake.notified() => continue,
				}
			};

			self.process(job_id, &shutdown).await;
		}

		self.running.store(false, Ordering::SeqCst);
		self.relabel().await;
		info!("🛑 Queue processor stopped");
	}

	/// Run the queue head to a terminal state and remove it from the queue
	#[allow(clippy::cast_possible_truncation)]
	async fn process(&self, job_id: JobId, shutdown: &CancellationToken) {
		let Some(job) = self.registry.get(&job_id).await else {
			warn!(%job_id, "Queued job missing from registry, skipping");
			self.finish(job_id, Err(String::new())).await;
			return;
		};

		let kill = self.active.install(job_id, shutdown.child_token()).await;

		if let Some(reason) = self.cancellations.reason(&job_id).await {
			self.active.clear().await;
			info!(%job_id, reason = reason.message(), "⏭️ Skipping job cancelled before start");
			self.settle(&job, Err(reason.message().to_string())).await;
			return;
		}

		if self.registry.update(&job_id, Job::start).await != Some(true) {
			// purged or failed by a concurrent call between peek and start
			self.active.clear().await;
			self.finish(job_id, Err(String::new())).await;
			return;
		}

		info!(%job_id, file_name = %job.file_name, language = %job.language, "🎬 Processing job");
		self.emit(job_id, JobEventKind::Started);

		let started = Instant::now();
		let outcome = self.execute(&job, kill).await;
		self.active.clear().await;

		let outcome = match self.cancellations.reason(&job_id).await {
			Some(reason) => Err(reason.message().to_string()),
			None => outcome,
		};

		match &outcome {
			Ok(transcript) => info!(%job_id, elapsed_ms = started.elapsed().as_millis() as u64, segments = transcript.segments.len(), "✅ Job completed"),
			Err(e) => warn!(%job_id, elapsed_ms = started.elapsed().as_millis() as u64, error = %e, "❌ Job failed"),
		}

		self.settle(&job, outcome).await;
	}

	/// Probe, estimate and transcribe. Every failure comes back as the job's error text.
	async fn execute(&self, job: &Job, kill: CancellationToken) -> Result<Transcript, String> {
		let audio_duration = self.probe.duration(&job.audio_path).await.map_err(|e| format!("Failed to get audio duration: {e}"))?;

		let expected = progress::expected_duration(audio_duration, self.config.speed_factor);
		debug!(job_id = %job.id, audio_secs = audio_duration.as_secs_f64(), expected_secs = expected.as_secs_f64(), "Estimated transcription time");

		let estimator = ProgressEstimator::spawn(Arc::clone(&self.registry), Arc::clone(&self.cancellations), job.id, expected, self.config.progress_tick);
		let request = WorkerRequest::new(job.id, &job.audio_path, &self.config.model_path, &job.language);
		let result = self.backend.transcribe(&request, kill).await;
		estimator.stop().await;

		result.map_err(|e| e.to_string())
	}

	/// Terminal bookkeeping for a job the scheduler picked up. The event goes
	/// out last, once outputs are saved and the upload is gone.
	async fn settle(&self, job: &Job, outcome: Result<Transcript, String>) {
		let Some(snapshot) = self.finish(job.id, outcome).await else {
			return;
		};

		if let Some(transcript) = &snapshot.result {
			if let Err(e) = self.persister.persist(job.id, &snapshot.file_name, transcript).await {
				error!(job_id = %job.id, error = %e, "Failed to save transcript");
			}
		}

		self.remove_upload(&job.audio_path).await;

		let kind = match snapshot.status {
			JobStatus::Completed => JobEventKind::Completed,
			_ => match self.cancellations.reason(&job.id).await {
				Some(CancelReason::Cancelled) => JobEventKind::Cancelled,
				Some(CancelReason::Killed) => JobEventKind::Killed,
				None => JobEventKind::Failed,
			},
		};
		self.emit(job.id, kind);
	}

	/// Apply the terminal state and drop the id from the queue in one critical
	/// section. Returns the new snapshot if this call made the transition.
	async fn finish(&self, job_id: JobId, outcome: Result<Transcript, String>) -> Option<Job> {
		let mut jobs = self.registry.write().await;
		let mut queue = self.queue.lock().await;

		let transitioned = jobs.get_mut(&job_id).is_some_and(|job| match outcome {
			Ok(transcript) => job.complete(transcript),
			Err(error) => job.fail(error),
		});

		queue.remove(&job_id);
		self.refresh_positions(&mut jobs, &queue);

		transitioned.then(|| jobs.get(&job_id).cloned()).flatten()
	}

	async fn relabel(&self) {
		let mut jobs = self.registry.write().await;
		let queue = self.queue.lock().await;
		self.refresh_positions(&mut jobs, &queue);
	}

	/// Recompute `queue_position` for every job. Caller holds both locks.
	fn refresh_positions(&self, jobs: &mut JobTable, queue: &PendingIds) {
		let running = self.running.load(Ordering::SeqCst);

		for job in jobs.values_mut() {
			job.queue_position = 0;
		}

		for (index, id) in queue.iter().enumerate() {
			let Some(job) = jobs.get_mut(id) else {
				continue;
			};
			let position = index + 1;
			job.queue_position = position;
			if job.status == JobStatus::Queued {
				job.message = if index == 0 && running {
					"Processing next...".to_string()
				} else {
					format!("Waiting in queue (position {position})")
				};
			}
		}
	}

	async fn remove_upload(&self, path: &Path) {
		if self.config.keep_uploads {
			return;
		}
		match tokio::fs::remove_file(path).await {
			Ok(()) => debug!(path = %path.display(), "Removed uploaded audio"),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove uploaded audio"),
		}
	}

	fn emit(&self, job_id: JobId, kind: JobEventKind) {
		// no subscribers is fine
		let _ = self.events.send(JobEvent::new(job_id, kind));
	}
}
