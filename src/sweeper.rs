// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Token Sweeper
//!
//! Background task that periodically deletes expired session rows from the
//! token table. Revocation blacklisting handles the security side of token
//! invalidation; this task only keeps the table from growing without bound.
//!
//! ## Strategy
//!
//! Every `sweep_interval` (default 24 h) the sweeper deletes tokens whose
//! expiry lies further in the past than the grace window (default 7 days).
//! The grace window keeps recently expired rows around so that refresh
//! attempts with a stale token still produce a precise "revoked" answer
//! instead of a generic miss.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, matching
//! the rest of the background tasks in the server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::{Db, TokenRepository};

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default grace period an expired token row survives before deletion.
const DEFAULT_GRACE_SECS: i64 = 7 * 24 * 60 * 60;

/// Background task that prunes expired session tokens from storage.
pub struct TokenSweeper {
    db: Arc<Db>,
    sweep_interval: Duration,
    grace_secs: i64,
}

impl TokenSweeper {
    /// Create a sweeper with the default interval and grace window.
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            db,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }

    /// Override the sweep interval and grace window.
    pub fn with_schedule(mut self, interval: Duration, grace_secs: i64) -> Self {
        self.sweep_interval = interval;
        self.grace_secs = grace_secs;
        self
    }

    /// Run the sweeper loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            grace_secs = self.grace_secs,
            "Token sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Token sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Token sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: delete token rows expired past the grace window.
    fn sweep_step(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.grace_secs);
        match TokenRepository::new(&self.db).delete_expired_before(cutoff) {
            Ok(0) => {}
            Ok(removed) => {
                info!(removed, cutoff = %cutoff, "Token sweeper: pruned expired tokens");
            }
            Err(e) => {
                // Leave the rows for the next sweep.
                warn!(error = %e, "Token sweeper: prune failed");
            }
        }
    }
}
