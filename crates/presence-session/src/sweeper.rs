//! Background removal of expired sessions

use std::sync::Arc;

use tokio::time::interval;

use crate::{Clock, SessionTable, SweeperConfig};

/// Background worker that drops stale sessions on a schedule
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use presence_session::{SessionSweeper, SessionTable, SweeperConfig, SystemClock};
///
/// #[tokio::main]
/// async fn main() {
///     let table = Arc::new(SessionTable::new());
///     let sweeper = SessionSweeper::new(table, Arc::new(SystemClock), SweeperConfig::default());
///
///     // Run indefinitely (until Ctrl+C)
///     sweeper.run().await;
/// }
/// ```
pub struct SessionSweeper {
    sessions: Arc<SessionTable>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl SessionSweeper {
    /// Create a sweeper over a session table
    pub fn new(sessions: Arc<SessionTable>, clock: Arc<dyn Clock>, config: SweeperConfig) -> Self {
        Self {
            sessions,
            clock,
            config,
        }
    }

    /// Sweep once; returns the number of sessions removed
    pub fn sweep(&self) -> usize {
        let removed = self.sessions.sweep(self.clock.now(), self.config.retention);
        if removed > 0 {
            tracing::info!(removed, remaining = self.sessions.len(), "Swept expired sessions");
        } else {
            tracing::debug!(remaining = self.sessions.len(), "Sweep found nothing to remove");
        }
        removed
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run(&self) {
        let mut ticker = interval(self.config.interval);

        tracing::info!("Session sweeper started (interval: {:?})", self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping session sweeper");
                    break;
                }
            }
        }
    }

    /// Run for a specific number of cycles (useful for testing)
    ///
    /// Returns the total number of sessions removed.
    pub async fn run_cycles(&self, cycles: usize) -> usize {
        let mut ticker = interval(self.config.interval);
        let mut removed = 0;

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);
            removed += self.sweep();
        }

        removed
    }
}
