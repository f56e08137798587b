use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::PersistError;
use crate::job::{JobId, Transcript};

/// Writes a finished transcript somewhere durable. Best effort: the engine
/// logs failures and leaves the job Completed.
#[async_trait]
pub trait ResultPersister: Send + Sync {
	async fn persist(&self, job_id: JobId, file_name: &str, transcript: &Transcript) -> Result<Vec<PathBuf>, PersistError>;
}

/// Saves `.txt`, `.srt`, `.vtt` and `.json` renditions into one directory.
///
/// Files are named `<stem>-<short job id>.<ext>`, so two uploads with the
/// same name never share outputs.
#[derive(Debug, Clone)]
pub struct FileResultPersister {
	output_dir: PathBuf,
}

impl FileResultPersister {
	pub fn new(output_dir: impl Into<PathBuf>) -> Self {
		Self { output_dir: output_dir.into() }
	}

	pub fn output_dir(&self) -> &Path {
		&self.output_dir
	}
}

#[async_trait]
impl ResultPersister for FileResultPersister {
	async fn persist(&self, job_id: JobId, file_name: &str, transcript: &Transcript) -> Result<Vec<PathBuf>, PersistError> {
		tokio::fs::create_dir_all(&self.output_dir).await?;

		let stem = format!("{}-{}", output_stem(file_name), job_id.short());
		let renditions = [
			("txt", render_text(transcript)),
			("srt", render_srt(transcript)),
			("vtt", render_vtt(transcript)),
			("json", serde_json::to_string_pretty(transcript)?),
		];

		let mut written = Vec::with_capacity(renditions.len());
		for (extension, contents) in renditions {
			let path = self.output_dir.join(format!("{stem}.{extension}"));
			tokio::fs::write(&path, contents).await?;
			written.push(path);
		}

		info!(%job_id, file_name, output_dir = %self.output_dir.display(), files = written.len(), "💾 Transcript saved");
		Ok(written)
	}
}

/// Original file name without its extension, reduced to characters safe in a path
pub fn output_stem(file_name: &str) -> String {
	let stem = Path::new(file_name).file_stem().and_then(|s| s.to_str()).unwrap_or_default();
	let cleaned: String = stem
		.chars()
		.map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') { c } else { '_' })
		.collect();
	let cleaned = cleaned.trim().trim_start_matches('.');
	if cleaned.is_empty() {
		"transcript".to_string()
	} else {
		cleaned.to_string()
	}
}

pub fn render_text(transcript: &Transcript) -> String {
	let mut text = transcript.text.trim().to_string();
	text.push('\n');
	text
}

pub fn render_srt(transcript: &Transcript) -> String {
	let mut out = String::new();
	for (index, segment) in transcript.segments.iter().enumerate() {
		let _ = writeln!(out, "{}", index + 1);
		let _ = writeln!(out, "{} --> {}", timestamp(segment.start, ','), timestamp(segment.end, ','));
		let _ = writeln!(out, "{}\n", segment.text.trim());
	}
	out
}

pub fn render_vtt(transcript: &Transcript) -> String {
	let mut out = String::from("WEBVTT\n\n");
	for segment in &transcript.segments {
		let _ = writeln!(out, "{} --> {}", timestamp(segment.start, '.'), timestamp(segment.end, '.'));
		let _ = writeln!(out, "{}\n", segment.text.trim());
	}
	out
}

/// `HH:MM:SS<sep>mmm`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn timestamp(seconds: f64, separator: char) -> String {
	let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
	let hours = total_ms / 3_600_000;
	let minutes = (total_ms / 60_000) % 60;
	let secs = (total_ms / 1000) % 60;
	let millis = total_ms % 1000;
	format!("{hours:02}:{minutes:02}:{secs:02}{separator}{millis:03}")
}
