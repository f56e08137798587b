use std::path::PathBuf;
use std::sync::Arc;
use transcribe_queue::TranscriptionEngine;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<TranscriptionEngine>,
	pub upload_dir: Arc<PathBuf>,
	pub device: Arc<str>,
}

impl AppState {
	pub fn new(engine: Arc<TranscriptionEngine>, upload_dir: PathBuf) -> Self {
		Self {
			engine,
			upload_dir: Arc::new(upload_dir),
			device: Arc::from(device_name()),
		}
	}
}

/// Host name reported by `/health`
fn device_name() -> String {
	std::env::var("HOSTNAME")
		.ok()
		.or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
		.or_else(|| std::fs::read_to_string("/etc/hostname").ok())
		.map(|name| name.trim().to_string())
		.filter(|name| !name.is_empty())
		.unwrap_or_else(|| "Local Server".to_string())
}
