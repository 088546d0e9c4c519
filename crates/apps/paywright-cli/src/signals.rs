//! Signal handling for clean shutdown.
//!
//! On SIGINT (Ctrl+C) or SIGTERM the decrypted wallet key is wiped from the
//! in-process cache before the process exits.

use std::sync::Arc;

use tokio::sync::watch;

use paywright_keystore::WalletManager;

/// Creates a shutdown signal receiver that triggers on SIGINT or SIGTERM.
///
/// Returns a `watch::Receiver<bool>` that changes to `true` when a shutdown
/// signal is received. The cached wallet key is cleared before the change is
/// published.
pub fn shutdown_signal(wallet: Arc<WalletManager>) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        wallet.clear_cache().await;
        let _ = tx.send(true);
    });

    rx
}

/// Wait for either SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paywright_keystore::MemBlobStore;

    #[tokio::test]
    async fn test_shutdown_signal_initial_state() {
        let wallet = Arc::new(WalletManager::new(MemBlobStore::new()));
        let rx = shutdown_signal(wallet);
        assert!(!*rx.borrow());
    }
}
