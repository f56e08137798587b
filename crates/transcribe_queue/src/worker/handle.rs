use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

#[derive(Debug)]
struct WorkerHandle {
	job_id: JobId,
	kill: CancellationToken,
}

/// Slot holding the kill handle of the job currently being executed.
///
/// Empty whenever the scheduler is idle. The token is handed to the backend
/// for the duration of one call; firing it makes the backend terminate its
/// child process.
#[derive(Debug, Default)]
pub struct ActiveWorker {
	slot: Mutex<Option<WorkerHandle>>,
}

impl ActiveWorker {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Occupy the slot for `job_id`, replacing any stale handle
	pub async fn install(&self, job_id: JobId, kill: CancellationToken) -> CancellationToken {
		let mut slot = self.slot.lock().await;
		*slot = Some(WorkerHandle { job_id, kill: kill.clone() });
		kill
	}

	pub async fn clear(&self) {
		self.slot.lock().await.take();
	}

	pub async fn current(&self) -> Option<JobId> {
		self.slot.lock().await.as_ref().map(|handle| handle.job_id)
	}

	pub async fn is(&self, job_id: &JobId) -> bool {
		self.current().await.as_ref() == Some(job_id)
	}

	/// Fire the kill handle if the slot belongs to `job_id`. Returns whether a handle was signalled.
	pub async fn kill(&self, job_id: &JobId) -> bool {
		match self.slot.lock().await.as_ref() {
			Some(handle) if handle.job_id == *job_id => {
				handle.kill.cancel();
				true
			}
			_ => false,
		}
	}
}
