use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Progress never reaches 100 until the job actually completes
pub const MAX_ESTIMATED_PROGRESS: f64 = 99.0;

/// Opaque job identifier, ordered so listings are deterministic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// First eight hex digits, enough to tell jobs apart in file names
	#[must_use]
	pub fn short(&self) -> String {
		let mut short = self.0.simple().to_string();
		short.truncate(8);
		short
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Queued,
	Processing,
	Transcribing,
	Completed,
	Failed,
}

impl JobStatus {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	/// Processing or Transcribing. At most one job is ever in this state.
	#[must_use]
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Processing | Self::Transcribing)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Queued => "queued",
			Self::Processing => "processing",
			Self::Transcribing => "transcribing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// One timed span of recognized speech, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
	pub start: f64,
	pub end: f64,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
	pub text: String,
	pub segments: Vec<Segment>,
	pub language: String,
}

/// A submitted transcription request and its evolving state.
///
/// Values handed out by the engine are snapshots; mutating one has no
/// effect on the engine. Status transitions go through the methods below,
/// which refuse to leave a terminal state so `result` and `error` are
/// written at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
	pub id: JobId,
	pub status: JobStatus,
	pub progress: f64,
	pub message: String,
	pub eta: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Transcript>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub file_name: String,
	pub audio_path: PathBuf,
	pub language: String,
	pub queue_position: usize,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
	pub fn new(id: JobId, file_name: impl Into<String>, audio_path: impl Into<PathBuf>, language: impl Into<String>) -> Self {
		Self {
			id,
			status: JobStatus::Queued,
			progress: 0.0,
			message: "Queued".to_string(),
			eta: String::new(),
			result: None,
			error: None,
			file_name: file_name.into(),
			audio_path: audio_path.into(),
			language: language.into(),
			queue_position: 0,
			created_at: Utc::now(),
			started_at: None,
			finished_at: None,
		}
	}

	/// Queued -> Processing
	pub(crate) fn start(&mut self) -> bool {
		if self.status != JobStatus::Queued {
			return false;
		}
		self.status = JobStatus::Processing;
		self.progress = 0.0;
		self.message = "Starting transcription...".to_string();
		self.eta.clear();
		self.started_at = Some(Utc::now());
		true
	}

	/// Estimator update. Only applies while the job is active; progress never moves backwards.
	pub(crate) fn report_progress(&mut self, progress: f64, message: String, eta: String) -> bool {
		if !self.status.is_active() {
			return false;
		}
		self.status = JobStatus::Transcribing;
		self.progress = self.progress.max(progress.clamp(0.0, MAX_ESTIMATED_PROGRESS));
		self.message = message;
		self.eta = eta;
		true
	}

	/// Replace the advisory message of a job that has not finished yet.
	pub(crate) fn annotate(&mut self, message: impl Into<String>) -> bool {
		if self.status.is_terminal() {
			return false;
		}
		self.message = message.into();
		true
	}

	pub(crate) fn complete(&mut self, transcript: Transcript) -> bool {
		if self.status.is_terminal() {
			return false;
		}
		self.status = JobStatus::Completed;
		self.progress = 100.0;
		self.message = "Completed".to_string();
		self.eta.clear();
		self.result = Some(transcript);
		self.finished_at = Some(Utc::now());
		true
	}

	pub(crate) fn fail(&mut self, error: impl Into<String>) -> bool {
		if self.status.is_terminal() {
			return false;
		}
		self.status = JobStatus::Failed;
		self.message = "Failed".to_string();
		self.eta.clear();
		self.error = Some(error.into());
		self.finished_at = Some(Utc::now());
		true
	}
}
