use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEventKind {
	Submitted,
	Started,
	Completed,
	Failed,
	Cancelled,
	Killed,
	Purged,
}

impl JobEventKind {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Submitted => "submitted",
			Self::Started => "started",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
			Self::Killed => "killed",
			Self::Purged => "purged",
		}
	}
}

/// Lifecycle notification published on the engine's broadcast channel
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
	pub job_id: JobId,
	pub kind: JobEventKind,
	pub at: DateTime<Utc>,
}

impl JobEvent {
	pub fn new(job_id: JobId, kind: JobEventKind) -> Self {
		Self { job_id, kind, at: Utc::now() }
	}
}
