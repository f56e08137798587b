mod handle;
mod process;
mod protocol;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::job::Transcript;

pub use handle::ActiveWorker;
pub use process::ProcessWorker;
pub use protocol::{WorkerRequest, WorkerResponse};

/// Runs one transcription to completion.
///
/// `kill` is the live handle for this call: once it is cancelled the
/// implementation must stop the work and return [`WorkerError::Killed`].
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
	async fn transcribe(&self, request: &WorkerRequest, kill: CancellationToken) -> Result<Transcript, WorkerError>;
}
