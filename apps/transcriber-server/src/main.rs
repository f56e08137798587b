mod config;
mod error;
mod handlers;
mod metrics;
mod model;
mod routes;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use transcribe_queue::{FfprobeProbe, FileResultPersister, ProcessWorker, TranscriptionEngine};

use config::Config;
use state::AppState;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
	// Load environment variables
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	init_tracing(&config)?;

	info!(
		version = env!("CARGO_PKG_VERSION"),
		model = %config.engine.model_path.display(),
		worker = %config.worker_command,
		speed_factor = config.engine.speed_factor,
		"🎯 Starting transcription server"
	);

	model::ensure_model(&config.engine.model_path, &config.model_url, config.model_min_bytes, config.download_model)
		.await
		.context("Whisper model is unavailable")?;

	for dir in [&config.upload_dir, &config.output_dir] {
		tokio::fs::create_dir_all(dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;
	}

	let worker = ProcessWorker::from_command_line(&config.worker_command).context("worker_command is empty")?;
	let engine = TranscriptionEngine::new(
		config.engine.clone(),
		Arc::new(worker),
		Arc::new(FfprobeProbe::new(&config.ffprobe_path)),
		Arc::new(FileResultPersister::new(&config.output_dir)),
	);

	let shutdown = CancellationToken::new();
	let processor = engine.spawn(shutdown.child_token());
	let listener_task = metrics::spawn_event_listener(engine.clone(), shutdown.child_token());

	let app = routes::router(AppState::new(engine, config.upload_dir.clone()), config.max_upload_bytes());

	let listener = TcpListener::bind((config.host.as_str(), config.port))
		.await
		.with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
	info!(address = %listener.local_addr()?, "🚀 Server listening");

	let signal_token = shutdown.clone();
	tokio::spawn(async move {
		wait_for_shutdown_signal().await;
		info!("🛑 Shutdown signal received (SIGTERM/SIGINT)");
		signal_token.cancel();
	});

	let server_token = shutdown.clone();
	axum::serve(listener, app)
		.with_graceful_shutdown(async move { server_token.cancelled().await })
		.await
		.context("HTTP server failed")?;
	info!("Server stopped");

	// stopping the processor kills any worker still running
	shutdown.cancel();
	let cleanup = async {
		if let Err(e) = processor.await {
			error!(error = %e, "Queue processor panicked");
		}
		let _ = listener_task.await;
	};

	match tokio::time::timeout(SHUTDOWN_TIMEOUT, cleanup).await {
		Ok(()) => info!("✅ Graceful shutdown completed"),
		Err(_) => warn!("⚠️ Shutdown timeout, exiting anyway"),
	}

	Ok(())
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(error = %e, "Failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}

fn init_tracing(config: &Config) -> Result<()> {
	let filter = EnvFilter::from_str(&config.rust_log).context("Invalid RUST_LOG filter")?;

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().with_filter(filter))
		})
		.try_init()
		.context("Failed to install tracing subscriber")?;

	Ok(())
}
