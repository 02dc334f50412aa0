use tokio::sync::broadcast;

pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;

pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    broadcast::channel(1)
}

/// Resolve once ctrl-c arrives, then tell every subscriber.
pub async fn wait_for_signal(tx: ShutdownSender) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested."),
        Err(e) => tracing::warn!(error = %e, "Unable to listen for ctrl-c; shutting down."),
    }
    let _ = tx.send(());
}
