use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::EngineError;
use crate::job::{Job, JobId};

/// The job map behind the registry lock
#[derive(Debug, Default)]
pub(crate) struct JobTable {
	jobs: HashMap<JobId, Job>,
}

impl JobTable {
	pub fn create(&mut self, job: Job) -> Result<(), EngineError> {
		match self.jobs.entry(job.id) {
			Entry::Occupied(entry) => Err(EngineError::DuplicateJob(*entry.key())),
			Entry::Vacant(entry) => {
				entry.insert(job);
				Ok(())
			}
		}
	}

	pub fn get(&self, id: &JobId) -> Option<&Job> {
		self.jobs.get(id)
	}

	pub fn get_mut(&mut self, id: &JobId) -> Option<&mut Job> {
		self.jobs.get_mut(id)
	}

	pub fn values(&self) -> impl Iterator<Item = &Job> {
		self.jobs.values()
	}

	pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Job> {
		self.jobs.values_mut()
	}

	/// Remove and return every job for which `purge` returns true
	pub fn purge_where(&mut self, mut purge: impl FnMut(&Job) -> bool) -> Vec<Job> {
		let ids: Vec<JobId> = self.jobs.values().filter(|job| purge(job)).map(|job| job.id).collect();
		ids.iter().filter_map(|id| self.jobs.remove(id)).collect()
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.jobs.len()
	}
}

/// Authoritative map of job id to job record.
///
/// Callers only ever receive clones. Multi-structure operations in the engine
/// take this lock before the pending queue lock.
#[derive(Debug, Default)]
pub struct JobRegistry {
	table: RwLock<JobTable>,
}

impl JobRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a new job. Fails if the id is already registered.
	#[cfg(test)]
	pub async fn create(&self, job: Job) -> Result<(), EngineError> {
		self.table.write().await.create(job)
	}

	pub async fn get(&self, id: &JobId) -> Option<Job> {
		self.table.read().await.get(id).cloned()
	}

	/// Apply `f` to the stored job. Returns `None` if the job was purged.
	pub async fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
		self.table.write().await.get_mut(id).map(f)
	}

	#[cfg(test)]
	pub async fn len(&self) -> usize {
		self.table.read().await.len()
	}

	#[cfg(test)]
	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub(crate) async fn read(&self) -> RwLockReadGuard<'_, JobTable> {
		self.table.read().await
	}

	pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, JobTable> {
		self.table.write().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::JobStatus;

	fn job() -> Job {
		Job::new(JobId::new(), "a.wav", "/tmp/a.wav", "auto")
	}

	#[tokio::test]
	async fn create_rejects_duplicate_ids() {
		let registry = JobRegistry::new();
		let job = job();
		registry.create(job.clone()).await.unwrap();
		assert!(matches!(registry.create(job).await, Err(EngineError::DuplicateJob(_))));
		assert_eq!(registry.len().await, 1);
	}

	#[tokio::test]
	async fn get_returns_detached_snapshot() {
		let registry = JobRegistry::new();
		let job = job();
		let id = job.id;
		registry.create(job).await.unwrap();

		let mut snapshot = registry.get(&id).await.unwrap();
		snapshot.status = JobStatus::Completed;
		snapshot.message = "tampered".into();

		let stored = registry.get(&id).await.unwrap();
		assert_eq!(stored.status, JobStatus::Queued);
		assert_eq!(stored.message, "Queued");
	}

	#[tokio::test]
	async fn update_on_missing_job_is_noop() {
		let registry = JobRegistry::new();
		let touched = registry.update(&JobId::new(), |job| job.fail("x")).await;
		assert!(touched.is_none());
		assert!(registry.is_empty().await);
	}

	#[tokio::test]
	async fn purge_where_removes_matching_jobs() {
		let registry = JobRegistry::new();
		let keep = job();
		let mut drop = job();
		drop.fail("done");
		let keep_id = keep.id;
		registry.create(keep).await.unwrap();
		registry.create(drop).await.unwrap();

		let purged = registry.write().await.purge_where(|job| job.status.is_terminal());
		assert_eq!(purged.len(), 1);
		assert!(registry.get(&keep_id).await.is_some());
		assert_eq!(registry.len().await, 1);
	}
}
