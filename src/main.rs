//! Entry point: parses CLI flags, waits for the logs directory to appear,
//! then runs the tailing pipeline and the metrics HTTP server side by side
//! until SIGINT/SIGTERM.

mod config;
mod error;
mod events;
mod fileid;
mod formats;
mod level;
mod metrics;
mod offsets;
mod output;
mod pending;
mod pipeline;
mod reassembler;
mod record;
mod resolver;
mod scanner;
mod tailer;
mod tailing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};

use crate::config::{AppConfig, Cli};
use crate::metrics::PrometheusMetrics;
use crate::pipeline::Bridge;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_cli(cli).context("failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!(
        env = %config.env,
        node = %config.node,
        logsdir = %config.logs_dir.display(),
        "starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx.clone());

    wait_for_logs_dir(&config.logs_dir, shutdown_rx.clone()).await?;
    if let Ok(canonical) = std::fs::canonicalize(&config.logs_dir) {
        config.logs_dir = canonical;
    }
    let config = Arc::new(config);

    let metrics = PrometheusMetrics::new();
    let metrics_server = tokio::spawn(serve_metrics(
        config.port,
        metrics.clone(),
        shutdown_rx.clone(),
    ));

    let (record_tx, mut record_rx) = mpsc::channel(1024);
    let bridge = Bridge::new(record_tx);

    let sink_node = config.node.clone();
    let sink_task = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let mut sink = crate::output::RecordSink::new(sink_node, stdout.lock());
        while let Some(record) = record_rx.blocking_recv() {
            if let Err(err) = sink.write_record(&record) {
                tracing::warn!(error = %err, "failed to write record to stdout");
            }
        }
    });

    let pipeline_metrics: Arc<dyn crate::metrics::MetricsFacade> = metrics.clone();
    pipeline::run(config.clone(), pipeline_metrics, bridge, shutdown_rx.clone()).await?;

    let _ = sink_task.await;
    let _ = metrics_server.await;

    tracing::info!("stopped");
    Ok(())
}

/// Polls for `logs_dir` to exist, doubling the wait each attempt (1s, 2s,
/// 4s, ...), until it appears or shutdown is requested.
async fn wait_for_logs_dir(logs_dir: &std::path::Path, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let mut backoff = Duration::from_secs(1);
    while !logs_dir.exists() {
        tracing::warn!(path = %logs_dir.display(), "logs directory does not exist yet, waiting");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {
                backoff *= 2;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    anyhow::bail!("shutdown requested before logs directory appeared");
                }
            }
        }
    }
    Ok(())
}

async fn serve_metrics(port: u16, metrics: Arc<PrometheusMetrics>, mut shutdown: watch::Receiver<bool>) {
    let app = crate::metrics::router(metrics);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind metrics server");
            return;
        }
    };
    tracing::info!(%addr, "metrics server listening");
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
    });
    if let Err(err) = serve.await {
        tracing::error!(error = %err, "metrics server error");
    }
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
