use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::WorkerError;
use crate::job::{JobId, Segment, Transcript};

/// Request handed to the worker executable as its last argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
	#[serde(rename = "jobID")]
	pub job_id: JobId,
	#[serde(rename = "audioPath")]
	pub audio_path: PathBuf,
	#[serde(rename = "modelPath")]
	pub model_path: PathBuf,
	pub language: String,
}

impl WorkerRequest {
	pub fn new(job_id: JobId, audio_path: &Path, model_path: &Path, language: &str) -> Self {
		Self {
			job_id,
			audio_path: audio_path.to_path_buf(),
			model_path: model_path.to_path_buf(),
			language: language.to_string(),
		}
	}
}

/// Single JSON line the worker prints on stdout before exiting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
	pub success: bool,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub text: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub segments: Vec<Segment>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// Wall-clock seconds spent inside the worker
	#[serde(default)]
	pub duration: f64,
}

impl WorkerResponse {
	pub fn success(text: String, segments: Vec<Segment>, duration: f64) -> Self {
		Self {
			success: true,
			text,
			segments,
			error: None,
			duration,
		}
	}

	pub fn failure(error: impl Into<String>) -> Self {
		Self {
			success: false,
			error: Some(error.into()),
			..Self::default()
		}
	}

	/// Parse the last non-empty line of the worker's stdout
	pub fn parse(stdout: &str) -> Result<Self, WorkerError> {
		let line = stdout
			.lines()
			.rev()
			.map(str::trim)
			.find(|line| !line.is_empty())
			.ok_or_else(|| WorkerError::MalformedOutput("worker produced no output".to_string()))?;

		serde_json::from_str(line).map_err(|e| WorkerError::MalformedOutput(e.to_string()))
	}

	/// Turn a decoded response into a transcript, rejecting failures and out-of-order segments
	pub fn into_transcript(self, language: &str) -> Result<Transcript, WorkerError> {
		if !self.success {
			return Err(WorkerError::Backend(self.error.unwrap_or_else(|| "worker reported failure".to_string())));
		}

		if let Some(pair) = self.segments.windows(2).find(|pair| pair[1].start < pair[0].start) {
			return Err(WorkerError::MalformedOutput(format!(
				"segment starting at {:.3}s follows one starting at {:.3}s",
				pair[1].start, pair[0].start
			)));
		}

		Ok(Transcript {
			text: self.text.trim().to_string(),
			segments: self.segments,
			language: language.to_string(),
		})
	}
}
