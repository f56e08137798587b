use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::protocol::{WorkerRequest, WorkerResponse};
use super::TranscriptionBackend;
use crate::error::WorkerError;
use crate::job::Transcript;

/// Keep diagnostics short enough to show in a job's error field
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs each transcription in its own OS process.
///
/// The request JSON is appended as the final argument of the configured
/// command. On unix the worker leads its own process group, and a forced kill
/// takes down the whole group (ffmpeg included) while the orchestrator keeps
/// running.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
	program: PathBuf,
	args: Vec<String>,
}

impl ProcessWorker {
	pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}

	/// Split a whitespace separated command line such as `transcribe-worker --quiet`
	pub fn from_command_line(command: &str) -> Option<Self> {
		let mut parts = command.split_whitespace();
		let program = parts.next()?;
		Some(Self::new(program, parts))
	}

	pub fn program(&self) -> &PathBuf {
		&self.program
	}
}

#[async_trait]
impl TranscriptionBackend for ProcessWorker {
	#[allow(clippy::cast_possible_truncation)]
	async fn transcribe(&self, request: &WorkerRequest, kill: CancellationToken) -> Result<Transcript, WorkerError> {
		if kill.is_cancelled() {
			return Err(WorkerError::Killed);
		}

		let payload = serde_json::to_string(request)?;
		let started = Instant::now();

		let mut command = Command::new(&self.program);
		command
			.args(&self.args)
			.arg(payload)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		#[cfg(unix)]
		command.process_group(0);

		let mut child = command.spawn().map_err(|source| WorkerError::Spawn {
			program: self.program.display().to_string(),
			source,
		})?;

		info!(job_id = %request.job_id, pid = child.id(), "🚀 Worker process started");

		let stdout = child.stdout.take().map(drain);
		let stderr = child.stderr.take().map(drain);

		let exited = tokio::select! {
			status = child.wait() => Some(status),
			() = kill.cancelled() => None,
		};

		let status = match exited {
			Some(status) => status?,
			None => {
				warn!(job_id = %request.job_id, pid = child.id(), "🔪 Terminating worker process");
				#[cfg(unix)]
				kill_group(child.id());
				if let Err(e) = child.kill().await {
					error!(job_id = %request.job_id, error = %e, "Failed to kill worker process");
				}
				abort(stdout);
				abort(stderr);
				return Err(WorkerError::Killed);
			}
		};

		let stdout = collect(stdout).await;
		let stderr = collect(stderr).await;

		debug!(
			job_id = %request.job_id,
			status = %status,
			elapsed_ms = started.elapsed().as_millis() as u64,
			stdout_bytes = stdout.len(),
			"Worker process exited"
		);

		decode_output(status, &stdout, &stderr, &request.language)
	}
}

/// SIGKILL every process in the worker's group. The worker's pid is the group id.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
	use nix::sys::signal::{killpg, Signal};
	use nix::unistd::Pid;

	let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
		return;
	};
	if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
		debug!(pgid, error = %e, "Worker process group already gone");
	}
}

fn drain<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	tokio::spawn(async move {
		let mut buf = Vec::new();
		if let Err(e) = reader.read_to_end(&mut buf).await {
			warn!(error = %e, "Failed to read worker output");
		}
		buf
	})
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
	match task {
		Some(task) => task.await.unwrap_or_default(),
		None => Vec::new(),
	}
}

fn abort(task: Option<JoinHandle<Vec<u8>>>) {
	if let Some(task) = task {
		task.abort();
	}
}

fn decode_output(status: ExitStatus, stdout: &[u8], stderr: &[u8], language: &str) -> Result<Transcript, WorkerError> {
	let stdout = String::from_utf8_lossy(stdout);

	match WorkerResponse::parse(&stdout) {
		// A worker that reports its own failure explains it better than the exit code does
		Ok(response) if !response.success => response.into_transcript(language),
		Ok(response) if status.success() => response.into_transcript(language),
		Err(e) if status.success() => Err(e),
		_ => Err(WorkerError::Exit {
			status: status.to_string(),
			stderr: stderr_tail(stderr),
		}),
	}
}

fn stderr_tail(stderr: &[u8]) -> String {
	let text = String::from_utf8_lossy(stderr);
	let text = text.trim();
	if text.len() <= STDERR_TAIL_BYTES {
		return text.to_string();
	}
	let mut cut = text.len() - STDERR_TAIL_BYTES;
	while !text.is_char_boundary(cut) {
		cut += 1;
	}
	format!("...{}", &text[cut..])
}
