use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// Sample rate whisper expects
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
	#[error("Failed to create temp file: {0}")]
	TempFile(#[source] std::io::Error),
	#[error("Failed to run ffmpeg: {0}")]
	Spawn(#[source] std::io::Error),
	#[error("Audio conversion failed: {0}")]
	Convert(String),
	#[error("Failed to read WAV: {0}")]
	Wav(#[from] hound::Error),
	#[error("Unexpected WAV layout: {channels} channel(s), {bits}-bit at {rate} Hz")]
	Layout { channels: u16, bits: u16, rate: u32 },
}

/// Decode any ffmpeg-readable file into 16 kHz mono f32 samples.
///
/// The intermediate WAV lives in a temp file that is removed on return.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn load_samples(ffmpeg: &Path, input: &Path) -> Result<Vec<f32>, AudioError> {
	let started = Instant::now();
	let wav = tempfile::Builder::new().suffix(".wav").tempfile().map_err(AudioError::TempFile)?;

	let output = Command::new(ffmpeg)
		.args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
		.arg(input)
		.args(["-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le", "-f", "wav"])
		.arg(wav.path())
		.stdin(Stdio::null())
		.output()
		.map_err(AudioError::Spawn)?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		return Err(AudioError::Convert(format!("{}: {}", output.status, stderr.trim())));
	}

	debug!(input = %input.display(), elapsed_ms = started.elapsed().as_millis() as u64, "ffmpeg conversion finished");

	let samples = read_wav(wav.path())?;
	info!(samples = samples.len(), duration_secs = samples.len() as f64 / f64::from(TARGET_SAMPLE_RATE), "🎵 Audio normalized");
	Ok(samples)
}

/// Read 16-bit mono PCM and scale it into [-1, 1)
pub fn read_wav(path: &Path) -> Result<Vec<f32>, AudioError> {
	let mut reader = hound::WavReader::open(path)?;
	let spec = reader.spec();

	if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_rate != TARGET_SAMPLE_RATE || spec.sample_format != hound::SampleFormat::Int {
		return Err(AudioError::Layout {
			channels: spec.channels,
			bits: spec.bits_per_sample,
			rate: spec.sample_rate,
		});
	}

	reader.samples::<i16>().map(|sample| sample.map(pcm_to_f32).map_err(AudioError::from)).collect()
}

#[inline]
pub fn pcm_to_f32(sample: i16) -> f32 {
	f32::from(sample) / 32768.0
}
