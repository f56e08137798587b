use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProbeError;

/// Reports how long an audio file plays. Feeds the progress estimate.
#[async_trait]
pub trait AudioProbe: Send + Sync {
	async fn duration(&self, path: &Path) -> Result<Duration, ProbeError>;
}

/// `ffprobe` based duration probe
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
	program: PathBuf,
}

impl Default for FfprobeProbe {
	fn default() -> Self {
		Self::new("ffprobe")
	}
}

impl FfprobeProbe {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self { program: program.into() }
	}
}

#[async_trait]
impl AudioProbe for FfprobeProbe {
	async fn duration(&self, path: &Path) -> Result<Duration, ProbeError> {
		let output = Command::new(&self.program)
			.args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
			.arg(path)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|source| ProbeError::Spawn {
				program: self.program.display().to_string(),
				source,
			})?;

		if !output.status.success() {
			return Err(ProbeError::Failed {
				status: output.status.to_string(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		let duration = parse_duration(&String::from_utf8_lossy(&output.stdout))?;
		debug!(path = %path.display(), duration_secs = duration.as_secs_f64(), "Probed audio duration");
		Ok(duration)
	}
}

/// Parse ffprobe's bare `format=duration` output, e.g. `"123.456000\n"`
pub fn parse_duration(raw: &str) -> Result<Duration, ProbeError> {
	let trimmed = raw.trim();
	let seconds: f64 = trimmed.parse().map_err(|_| ProbeError::Parse(trimmed.to_string()))?;
	if !seconds.is_finite() || seconds < 0.0 {
		return Err(ProbeError::Parse(trimmed.to_string()));
	}
	Ok(Duration::from_secs_f64(seconds))
}
