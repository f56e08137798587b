use std::collections::VecDeque;
use tokio::sync::{Mutex, MutexGuard};

use crate::job::JobId;

/// FIFO of job ids waiting for the scheduler
#[derive(Debug, Default)]
pub(crate) struct PendingIds {
	ids: VecDeque<JobId>,
}

impl PendingIds {
	pub fn push(&mut self, id: JobId) {
		self.ids.push_back(id);
	}

	pub fn front(&self) -> Option<JobId> {
		self.ids.front().copied()
	}

	/// Remove `id` wherever it sits, keeping the relative order of the rest
	pub fn remove(&mut self, id: &JobId) -> bool {
		match self.ids.iter().position(|queued| queued == id) {
			Some(index) => {
				self.ids.remove(index);
				true
			}
			None => false,
		}
	}

	pub fn contains(&self, id: &JobId) -> bool {
		self.ids.contains(id)
	}

	pub fn retain(&mut self, keep: impl FnMut(&JobId) -> bool) {
		self.ids.retain(keep);
	}

	pub fn iter(&self) -> impl Iterator<Item = &JobId> {
		self.ids.iter()
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}
}

/// Pending queue lock. Never acquired while holding a lock that the registry
/// lock must precede.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
	inner: Mutex<PendingIds>,
}

impl PendingQueue {
	pub async fn lock(&self) -> MutexGuard<'_, PendingIds> {
		self.inner.lock().await
	}

	pub async fn front(&self) -> Option<JobId> {
		self.inner.lock().await.front()
	}

	pub async fn len(&self) -> usize {
		self.inner.lock().await.len()
	}
}
