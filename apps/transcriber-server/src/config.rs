use clap::Parser;
use std::path::PathBuf;
use transcribe_queue::EngineConfig;

pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin";

#[derive(Parser, Debug, Clone)]
#[command(name = "transcriber-server")]
#[command(about = "Queue audio files for transcription and report progress over HTTP", long_about = None)]
#[command(version)]
pub struct Config {
	/// Address to bind
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,

	#[arg(long, env = "PORT", default_value = "8456")]
	pub port: u16,

	/// Where uploaded audio waits until its job finishes
	#[arg(long, env = "UPLOAD_DIR", default_value = "/tmp/transcriber-uploads")]
	pub upload_dir: PathBuf,

	/// Where .txt/.srt/.vtt/.json transcripts are written
	#[arg(long, env = "OUTPUT_DIR", default_value = "/tmp/transcriber-output")]
	pub output_dir: PathBuf,

	/// Worker executable plus leading arguments; the request JSON is appended
	#[arg(long, env = "WORKER_COMMAND", default_value = "transcribe-worker")]
	pub worker_command: String,

	#[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
	pub ffprobe_path: PathBuf,

	/// Fetch the model when it is missing or truncated
	#[arg(long, env = "DOWNLOAD_MODEL", default_value = "true", action = clap::ArgAction::Set)]
	pub download_model: bool,

	#[arg(long, env = "MODEL_URL", default_value = DEFAULT_MODEL_URL)]
	pub model_url: String,

	/// Smallest model file accepted as complete, in bytes
	#[arg(long, env = "MODEL_MIN_BYTES", default_value = "2994000000")]
	pub model_min_bytes: u64,

	/// Upload size limit in megabytes
	#[arg(long, env = "MAX_UPLOAD_MB", default_value = "20480")]
	pub max_upload_mb: usize,

	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	#[arg(long, env = "RUST_LOG", default_value = "info,tower_http=info")]
	pub rust_log: String,

	#[command(flatten)]
	pub engine: EngineConfig,
}

impl Config {
	pub fn validate(&self) -> Result<(), String> {
		if self.worker_command.trim().is_empty() {
			return Err("worker_command must not be empty".to_string());
		}

		if self.max_upload_mb == 0 {
			return Err("max_upload_mb must be greater than 0".to_string());
		}

		if self.download_model && self.model_url.trim().is_empty() {
			return Err("model_url is required when download_model is enabled".to_string());
		}

		self.engine.validate()
	}

	pub fn max_upload_bytes(&self) -> usize {
		self.max_upload_mb.saturating_mul(1024 * 1024)
	}
}
