use std::sync::Arc;

use tokio::signal;
use tokio::time;
use tracing::{info, warn};

use crate::session::Session;

/// Owns the session deadline: waits for it in the control loop (never in
/// a signal-handler context) and moves the session into `Draining`.
pub struct LifecycleController {
    session: Arc<Session>,
}

impl LifecycleController {
    pub fn new(session: Arc<Session>) -> Self {
        LifecycleController { session }
    }

    /// Block until the wall-clock budget expires (or the process is
    /// interrupted), then signal every pool to stop.
    pub async fn run(&self) {
        tokio::select! {
            _ = time::sleep_until(self.session.deadline()) => {
                info!("session budget expired, draining");
            }
            _ = wait_for_interrupt() => {
                info!("interrupt received, draining early");
            }
        }
        self.session.begin_drain();
    }
}

async fn wait_for_interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        // Without an interrupt listener the deadline is the only trigger
        warn!("interrupt listener failed: {err}");
        std::future::pending::<()>().await;
    }
}
