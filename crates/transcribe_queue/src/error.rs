use crate::job::JobId;
use thiserror::Error;

/// Errors returned to callers of the engine's public operations
#[derive(Error, Debug)]
pub enum EngineError {
	#[error("Job already exists: {0}")]
	DuplicateJob(JobId),
	#[error("Job {0} not found in queue")]
	NotInQueue(JobId),
	#[error("Job {0} is not running")]
	NotRunning(JobId),
}

/// Failures of a single worker invocation. Always terminal for the job.
#[derive(Error, Debug)]
pub enum WorkerError {
	#[error("Failed to serialize worker request: {0}")]
	Request(#[from] serde_json::Error),
	#[error("Failed to start worker {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},
	#[error("Worker process I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Worker exited with {status}: {stderr}")]
	Exit { status: String, stderr: String },
	#[error("Malformed worker output: {0}")]
	MalformedOutput(String),
	#[error("Transcription failed: {0}")]
	Backend(String),
	#[error("Worker process was killed")]
	Killed,
}

#[derive(Error, Debug)]
pub enum ProbeError {
	#[error("Failed to run {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},
	#[error("Probe exited with {status}: {stderr}")]
	Failed { status: String, stderr: String },
	#[error("Unreadable duration {0:?}")]
	Parse(String),
}

#[derive(Error, Debug)]
pub enum PersistError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
