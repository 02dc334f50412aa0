use std::sync::Arc;

use clap::Parser;
use tracing::info;

use statsd_relay::config::{Args, RelayConfig, SinkConfig};
use statsd_relay::error::{AppError, AppResult};
use statsd_relay::flush::{Flusher, SummaryOptions};
use statsd_relay::listener::Listener;
use statsd_relay::sinks::{LibratoSink, ProxySink, Sink};
use statsd_relay::{logger, metrics, server, shutdown, AppState};

fn build_sink(config: &SinkConfig) -> AppResult<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match config {
        SinkConfig::Librato { url, user, token } => {
            Arc::new(LibratoSink::new(url.clone(), user.clone(), token.clone())?)
        }
        SinkConfig::Proxy { addr } => Arc::new(ProxySink::new(addr.clone())),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();
    logger::init_logging(args.debug);
    let config = RelayConfig::try_from(args)?;

    // ── 1. Aggregation core ──────────────────────────────────────
    let aggregator = Arc::new(metrics::Aggregator::new());
    let sink = build_sink(&config.sink)?;
    let flusher = Flusher::new(
        aggregator.clone(),
        sink,
        SummaryOptions::new(&config.percentiles, config.median),
        config.source.clone(),
    );

    let state = Arc::new(AppState {
        aggregator: aggregator.clone(),
        flush_stats: flusher.stats(),
    });

    let (shutdown_tx, _) = shutdown::channel();

    // ── 2. Inbound listener ──────────────────────────────────────
    let inbound = Listener::bind(config.transport, &config.address).await?;
    let mut tasks = vec![tokio::spawn(
        inbound.run(aggregator, shutdown_tx.subscribe()),
    )];

    // ── 3. Flush scheduler ───────────────────────────────────────
    tasks.push(tokio::spawn(
        flusher.run(config.flush_interval, shutdown_tx.subscribe()),
    ));

    // ── 4. Admin interface ───────────────────────────────────────
    let admin = match &config.admin_address {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|source| AppError::Bind {
                    transport: "tcp",
                    addr: addr.clone(),
                    source,
                })?;
            info!(%addr, "Admin interface listening.");
            let app = server::create_router(state);
            let mut rx = shutdown_tx.subscribe();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = rx.recv().await;
                    })
                    .await
            }))
        }
        None => None,
    };

    // ── 5. Run until ctrl-c ──────────────────────────────────────
    shutdown::wait_for_signal(shutdown_tx).await;

    for task in tasks {
        task.await?;
    }
    if let Some(admin) = admin {
        admin.await?.map_err(|source| AppError::AdminServer { source })?;
    }

    info!("Stopped.");
    Ok(())
}
