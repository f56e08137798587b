use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
	/// Graceful cancel of a queued job, or intent flagged on a running one
	Cancelled,
	/// Forced termination of the running worker process
	Killed,
}

impl CancelReason {
	#[must_use]
	pub const fn message(self) -> &'static str {
		match self {
			Self::Cancelled => "cancelled by user",
			Self::Killed => "killed by user",
		}
	}
}

/// Ids that must not complete successfully.
///
/// Marks are never removed, and the first reason recorded for an id wins.
#[derive(Debug, Default)]
pub struct CancellationSet {
	marks: Mutex<HashMap<JobId, CancelReason>>,
}

impl CancellationSet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `reason` for `id` unless it is already marked. Returns the effective reason.
	pub async fn mark(&self, id: JobId, reason: CancelReason) -> CancelReason {
		*self.marks.lock().await.entry(id).or_insert(reason)
	}

	pub async fn reason(&self, id: &JobId) -> Option<CancelReason> {
		self.marks.lock().await.get(id).copied()
	}

	pub async fn contains(&self, id: &JobId) -> bool {
		self.marks.lock().await.contains_key(id)
	}

	/// Hold the set while checking something that decides whether to mark
	pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<JobId, CancelReason>> {
		self.marks.lock().await
	}
}
