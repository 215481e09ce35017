//! Core daemon entrypoint: loads configuration once, builds the shared
//! context, and runs the scheduler alongside one dispatcher task per
//! configured queue until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scc_daemon::{CoreConfig, CoreContext, Dispatcher};
use scc_scheduler::{default_templates, Scheduler};
use scc_store::{JobRepository, SchedulerRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider().install_default().expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("scc=info".parse().unwrap()))
        .init();

    info!("starting scc-daemon");

    let config = CoreConfig::load().context("loading daemon configuration")?;
    let metrics_handle = scc_daemon::metrics::init_metrics();
    let metrics_port = config.metrics_port;

    let ctx = Arc::new(CoreContext::new(config).await.context("building core context")?);

    let scheduler = Arc::new(
        Scheduler::new(default_templates(), SchedulerRepository::new(ctx.pool.clone()), JobRepository::new(ctx.pool.clone()))
            .context("constructing scheduler")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx.clone())));

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
    for def in ctx.queue_config.queues.clone() {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move { dispatcher.run_queue(def.name, def.concurrency).await }));
    }

    tasks.push(tokio::spawn(serve_metrics(metrics_handle, metrics_port)));

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
    dispatcher.shutdown();
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "daemon task panicked");
        }
    }

    info!("scc-daemon shutdown complete");
    Ok(())
}

/// Serve the Prometheus text exposition format on `/metrics` without pulling
/// in the full axum router this process otherwise has no use for.
async fn serve_metrics(handle: metrics_exporter_prometheus::PrometheusHandle, port: u16) {
    use std::net::SocketAddr;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind metrics listener");
            return;
        }
    };
    info!(%addr, "metrics endpoint listening");

    loop {
        let Ok((mut stream, _)) = listener.accept().await else { continue };
        let body = handle.render();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
    }
}
