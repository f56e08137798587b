//! Single-flight transcription queue.
//!
//! Jobs are accepted in any number, kept in a FIFO and handed one at a time to
//! a [`TranscriptionBackend`], normally a [`ProcessWorker`] subprocess. While a
//! job runs its progress is estimated from the audio duration. Pending jobs can
//! be cancelled, the running one can be killed.

pub mod cancellation;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod persist;
pub mod probe;
pub mod progress;
mod queue;
mod registry;
pub mod worker;

pub use cancellation::CancelReason;
pub use config::EngineConfig;
pub use engine::{QueueListing, TranscriptionEngine};
pub use error::{EngineError, PersistError, ProbeError, WorkerError};
pub use events::{JobEvent, JobEventKind};
pub use job::{Job, JobId, JobStatus, Segment, Transcript};
pub use persist::{FileResultPersister, ResultPersister};
pub use probe::{AudioProbe, FfprobeProbe};
pub use worker::{ProcessWorker, TranscriptionBackend, WorkerRequest, WorkerResponse};
