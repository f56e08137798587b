mod audio;
mod transcription;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transcribe_queue::{WorkerRequest, WorkerResponse};

/// Transcribe one audio file and print a single JSON result line.
///
/// Spawned by transcriber-server once per job; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "transcribe-worker", version)]
struct Args {
	/// Request JSON: {"jobID", "audioPath", "modelPath", "language"}
	request: String,

	#[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
	ffmpeg: PathBuf,

	/// Threads for Whisper processing
	#[arg(long, env = "WHISPER_THREADS", default_value_t = default_threads())]
	threads: i32,
}

fn default_threads() -> i32 {
	std::thread::available_parallelism().map_or(4, |n| i32::try_from(n.get()).unwrap_or(4)).min(8)
}

fn main() -> ExitCode {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let started = Instant::now();
	let response = match run(&args) {
		Ok(output) => WorkerResponse::success(output.text, output.segments, started.elapsed().as_secs_f64()),
		Err(e) => {
			error!(error = %e, "❌ Transcription failed");
			WorkerResponse::failure(e.to_string())
		}
	};

	let success = response.success;
	match serde_json::to_string(&response) {
		Ok(line) => println!("{line}"),
		Err(e) => {
			error!(error = %e, "Failed to encode response");
			return ExitCode::FAILURE;
		}
	}

	if success {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	}
}

fn run(args: &Args) -> anyhow::Result<transcription::Output> {
	let request: WorkerRequest = serde_json::from_str(&args.request).map_err(|e| anyhow::anyhow!("Invalid request: {e}"))?;

	info!(job_id = %request.job_id, audio = %request.audio_path.display(), language = %request.language, "🎬 Worker started");

	let samples = audio::load_samples(&args.ffmpeg, &request.audio_path)?;
	let output = transcription::transcribe(&request.model_path, &samples, &request.language, args.threads)?;

	info!(job_id = %request.job_id, segments = output.segments.len(), "✅ Transcription complete");
	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_request_argument() {
		let args = Args::try_parse_from(["transcribe-worker", r#"{"jobID":"x"}"#, "--threads", "2"]).unwrap();
		assert_eq!(args.threads, 2);
		assert_eq!(args.request, r#"{"jobID":"x"}"#);
	}

	#[test]
	fn malformed_request_is_an_error() {
		let args = Args::try_parse_from(["transcribe-worker", "not json"]).unwrap();
		let err = run(&args).unwrap_err();
		assert!(err.to_string().starts_with("Invalid request"));
	}

	#[test]
	fn missing_audio_fails_before_transcription() {
		let request = r#"{"jobID":"5f0c6a52-6c1e-4a7e-9a59-0b8f3d3f1e2a","audioPath":"/nonexistent/a.wav","modelPath":"/nonexistent/m.bin","language":"auto"}"#;
		let args = Args::try_parse_from(["transcribe-worker", request, "--ffmpeg", "/nonexistent/ffmpeg"]).unwrap();
		assert!(run(&args).is_err());
	}
}
