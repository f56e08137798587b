use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// Whether a model at `path` can be used as is
#[derive(Debug, PartialEq, Eq)]
pub enum ModelState {
	Ready(u64),
	Missing,
	Truncated(u64),
}

pub async fn inspect(path: &Path, min_bytes: u64) -> Result<ModelState> {
	match tokio::fs::metadata(path).await {
		Ok(meta) if meta.len() >= min_bytes => Ok(ModelState::Ready(meta.len())),
		Ok(meta) => Ok(ModelState::Truncated(meta.len())),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ModelState::Missing),
		Err(e) => Err(e).with_context(|| format!("Failed to stat model {}", path.display())),
	}
}

/// Make sure a complete model file sits at `path`, downloading it with curl
/// when allowed. Any failure here stops startup.
pub async fn ensure_model(path: &Path, url: &str, min_bytes: u64, download: bool) -> Result<()> {
	match inspect(path, min_bytes).await? {
		ModelState::Ready(size) => {
			info!(path = %path.display(), size_bytes = size, "✅ Whisper model present");
			return Ok(());
		}
		ModelState::Truncated(size) => {
			warn!(path = %path.display(), size_bytes = size, expected_min_bytes = min_bytes, "⚠️ Model file looks incomplete, removing");
			tokio::fs::remove_file(path).await.with_context(|| format!("Failed to remove incomplete model {}", path.display()))?;
		}
		ModelState::Missing => {}
	}

	if !download {
		bail!("Whisper model not found at {} and downloading is disabled", path.display());
	}

	if let Some(dir) = path.parent() {
		tokio::fs::create_dir_all(dir).await.with_context(|| format!("Failed to create model directory {}", dir.display()))?;
	}

	info!(url, path = %path.display(), "⬇️ Downloading Whisper model, this can take several minutes");

	if let Err(e) = download_with_curl(path, url).await {
		let _ = tokio::fs::remove_file(path).await;
		return Err(e);
	}

	match inspect(path, min_bytes).await? {
		ModelState::Ready(size) => {
			info!(path = %path.display(), size_bytes = size, "✅ Whisper model downloaded");
			Ok(())
		}
		_ => {
			let _ = tokio::fs::remove_file(path).await;
			bail!("Downloaded model at {} is smaller than {min_bytes} bytes", path.display())
		}
	}
}

async fn download_with_curl(path: &Path, url: &str) -> Result<()> {
	let status = Command::new("curl")
		.args(["-L", "--fail", "--progress-bar", "-o"])
		.arg(path)
		.arg(url)
		.status()
		.await
		.context("Failed to run curl")?;

	if !status.success() {
		bail!("curl exited with {status} while downloading {url}");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn classifies_model_files() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.bin");
		assert_eq!(inspect(&path, 10).await.unwrap(), ModelState::Missing);

		std::fs::write(&path, [0u8; 4]).unwrap();
		assert_eq!(inspect(&path, 10).await.unwrap(), ModelState::Truncated(4));
		assert_eq!(inspect(&path, 4).await.unwrap(), ModelState::Ready(4));
	}

	#[tokio::test]
	async fn truncated_model_without_download_is_fatal_and_removed() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.bin");
		std::fs::write(&path, [0u8; 4]).unwrap();

		assert!(ensure_model(&path, "http://localhost/unused", 1024, false).await.is_err());
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn complete_model_is_left_alone() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.bin");
		std::fs::write(&path, [1u8; 64]).unwrap();

		ensure_model(&path, "http://localhost/unused", 64, false).await.unwrap();
		assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
	}
}
