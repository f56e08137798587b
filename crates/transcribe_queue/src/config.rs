use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::progress::default_speed_factor;

/// Engine tuning, flattened into the server's command line
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
	#[arg(long, env = "WHISPER_MODEL_PATH", default_value_os_t = default_model_path(), help = "Whisper model handed to every worker")]
	pub model_path: PathBuf,

	#[arg(long, env = "SPEED_FACTOR", default_value_t = default_speed_factor(), help = "Assumed transcription speed as a multiple of real time")]
	pub speed_factor: f64,

	#[arg(
		long = "progress-tick-ms",
		env = "PROGRESS_TICK_MS",
		default_value = "500",
		value_parser = parse_millis,
		help = "Interval between progress estimates in milliseconds"
	)]
	pub progress_tick: Duration,

	#[arg(long, env = "KEEP_UPLOADS", default_value = "false", help = "Leave uploaded audio on disk after a job finishes")]
	pub keep_uploads: bool,

	#[arg(long, env = "EVENT_CAPACITY", default_value = "256", help = "Buffered job events per subscriber")]
	pub event_capacity: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			model_path: default_model_path(),
			speed_factor: default_speed_factor(),
			progress_tick: Duration::from_millis(500),
			keep_uploads: false,
			event_capacity: 256,
		}
	}
}

impl EngineConfig {
	pub fn validate(&self) -> Result<(), String> {
		if !self.speed_factor.is_finite() || self.speed_factor <= 0.0 {
			return Err("speed_factor must be a positive number".to_string());
		}

		if self.progress_tick.is_zero() {
			return Err("progress_tick must be greater than 0".to_string());
		}

		if self.event_capacity == 0 {
			return Err("event_capacity must be greater than 0".to_string());
		}

		Ok(())
	}

	#[cfg(test)]
	pub fn test() -> Self {
		Self {
			model_path: PathBuf::from("/tmp/test-model.bin"),
			speed_factor: 1.0,
			progress_tick: Duration::from_millis(10),
			keep_uploads: false,
			event_capacity: 4096,
		}
	}
}

/// `~/.cache/whisper/ggml-large-v3.bin`
pub fn default_model_path() -> PathBuf {
	let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")).map_or_else(|| PathBuf::from("."), PathBuf::from);
	home.join(".cache").join("whisper").join("ggml-large-v3.bin")
}

fn parse_millis(s: &str) -> Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_millis)
}
