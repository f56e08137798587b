// Only the whisper build calls into the model helpers
#![cfg_attr(not(feature = "whisper"), allow(dead_code))]

use std::path::Path;
use transcribe_queue::Segment;

#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
	#[error("Whisper backend not compiled in, rebuild transcribe-worker with `--features whisper`")]
	Unavailable,
	#[error("Failed to load model {path}: {message}")]
	Model { path: String, message: String },
	#[error("{0}")]
	Inference(String),
}

/// Full text plus timed segments
#[derive(Debug, Default, PartialEq)]
pub struct Output {
	pub text: String,
	pub segments: Vec<Segment>,
}

/// Build the output from whisper segments given as (start, end) in
/// centiseconds plus text. Blank segments are dropped.
pub fn assemble(raw: impl IntoIterator<Item = (i64, i64, String)>) -> Output {
	let segments: Vec<Segment> = raw
		.into_iter()
		.filter_map(|(start, end, text)| {
			let text = text.trim();
			(!text.is_empty()).then(|| Segment {
				start: centis_to_secs(start),
				end: centis_to_secs(end),
				text: text.to_string(),
			})
		})
		.collect();

	let text = segments.iter().map(|segment| segment.text.as_str()).collect::<Vec<_>>().join(" ");
	Output { text, segments }
}

#[allow(clippy::cast_precision_loss)]
fn centis_to_secs(centis: i64) -> f64 {
	centis.max(0) as f64 / 100.0
}

/// Language handed to whisper; anything blank means auto detection
pub fn whisper_language(language: &str) -> &str {
	let language = language.trim();
	if language.is_empty() {
		"auto"
	} else {
		language
	}
}

#[cfg(feature = "whisper")]
#[allow(clippy::cast_possible_truncation)]
pub fn transcribe(model_path: &Path, samples: &[f32], language: &str, threads: i32) -> Result<Output, TranscribeError> {
	use std::time::Instant;
	use tracing::{info, warn};
	use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

	let model = model_path.to_string_lossy();
	info!(model = %model, "🔄 Loading Whisper model...");
	let start = Instant::now();
	let ctx = WhisperContext::new_with_params(&model, WhisperContextParameters::default()).map_err(|e| TranscribeError::Model {
		path: model.to_string(),
		message: e.to_string(),
	})?;
	info!(load_time_ms = start.elapsed().as_millis() as u64, threads, "✅ Whisper model loaded");

	let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
	params.set_translate(false);
	params.set_print_special(false);
	params.set_print_progress(false);
	params.set_print_realtime(false);
	params.set_print_timestamps(false);
	params.set_n_threads(threads);
	params.set_language(Some(whisper_language(language)));

	let mut state = ctx.create_state().map_err(|e| TranscribeError::Inference(format!("Failed to create Whisper state: {e}")))?;

	info!(samples = samples.len(), language = whisper_language(language), "🧠 Running Whisper model...");
	let start = Instant::now();
	state.full(params, samples).map_err(|e| TranscribeError::Inference(e.to_string()))?;
	info!(transcribe_ms = start.elapsed().as_millis() as u64, "✅ Whisper finished");

	let count = state.full_n_segments();
	if count == 0 {
		warn!("⚠️ No segments extracted, audio may be silence");
	}

	let raw = (0..count).filter_map(|i| state.get_segment(i)).filter_map(|segment| {
		let text = segment.to_str().ok()?.to_string();
		Some((segment.start_timestamp(), segment.end_timestamp(), text))
	});

	Ok(assemble(raw.collect::<Vec<_>>()))
}

#[cfg(not(feature = "whisper"))]
pub fn transcribe(_model_path: &Path, _samples: &[f32], _language: &str, _threads: i32) -> Result<Output, TranscribeError> {
	Err(TranscribeError::Unavailable)
}
