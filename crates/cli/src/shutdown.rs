use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turns SIGINT/SIGTERM into cancellation of the running migration, which
/// then stops at its next page boundary. A second signal exits at once.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handlers(&self) {
        let coordinator = self.clone();

        tokio::spawn(async move {
            wait_for_signal().await;
            coordinator.request();
            info!("Shutdown requested, finishing the current page; press Ctrl+C again to abort");

            wait_for_signal().await;
            warn!("Second shutdown signal, exiting without a final checkpoint");
            std::process::exit(ExitCode::ShutdownRequested.as_i32());
        });
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Exit code for a finished command. Anything that ends after a
    /// shutdown request reports 130, failed or not.
    pub fn exit_code(&self, failed: bool) -> ExitCode {
        if self.is_shutdown_requested() {
            ExitCode::ShutdownRequested
        } else if failed {
            ExitCode::GeneralError
        } else {
            ExitCode::Success
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// 128 + SIGINT
    ShutdownRequested = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_request_wins_over_outcome() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.exit_code(false), ExitCode::Success);
        assert_eq!(coordinator.exit_code(true), ExitCode::GeneralError);

        coordinator.request();
        assert!(coordinator.cancel_token().is_cancelled());
        assert_eq!(coordinator.exit_code(false), ExitCode::ShutdownRequested);
        assert_eq!(coordinator.exit_code(true).as_i32(), 130);
    }
}
