// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Soulseek session state.
//!
//! Tracks whether the slskd daemon holds a live connection to the Soulseek
//! network. Every search or download operation is gated on this state:
//! callers check [`Session::is_logged_in`] and fail fast instead of letting
//! a request time out against a disconnected daemon.
//!
//! The session is created once at process start and lives for the process
//! lifetime. Only [`Session::login`] mutates it; other components either
//! read the flag or wait on the readiness signal.

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::watch;

use crate::gateway::SlskdClient;

/// How long `login` polls the daemon for a connection before giving up.
const LOGIN_TIMEOUT_SECS: u64 = 30;

/// Interval between connection-state polls during login.
const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection/login state for the Soulseek network.
pub struct Session {
    client: SlskdClient,
    username: String,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl Session {
    /// Create a new session in the logged-out state.
    pub fn new(client: SlskdClient, username: impl Into<String>) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            client,
            username: username.into(),
            ready_tx,
            ready_rx,
        }
    }

    /// Non-blocking read of the login state.
    pub fn is_logged_in(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// The Soulseek username the daemon logs in with.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Perform the connect handshake against the daemon.
    ///
    /// If the daemon already reports a connection, the session is marked
    /// ready immediately. Otherwise a connect command is issued and the
    /// connection state polled once per second for up to 30 seconds.
    /// On success all [`Session::wait_for_login`] waiters are released.
    pub async fn login(&self) -> Result<()> {
        let state = self
            .client
            .server_state()
            .await
            .map_err(|e| {
                tracing::error!(error = %format!("{:#}", e), "Could not query daemon state");
                e
            })?;

        if state.is_connected() {
            tracing::info!("Already connected to Soulseek");
            self.mark_ready();
            return Ok(());
        }

        if state.is_disconnected() {
            self.client.connect().await?;
            tracing::info!("Soulseek connection initiated, waiting for handshake");
        }

        for _ in 0..LOGIN_TIMEOUT_SECS {
            match self.client.server_state().await {
                Ok(state) if state.is_connected() => {
                    tracing::info!("Successfully connected to Soulseek");
                    self.mark_ready();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Connection poll failed, retrying");
                }
            }
            tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
        }

        bail!("Failed to connect to Soulseek within {} seconds", LOGIN_TIMEOUT_SECS)
    }

    /// Block the calling task until login completes or the timeout elapses.
    /// Returns true if the session became ready in time.
    pub async fn wait_for_login(&self, timeout: Duration) -> bool {
        let mut rx = self.ready_rx.clone();
        if *rx.borrow() {
            return true;
        }
        let wait = async {
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return true;
                }
            }
            false
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    fn mark_ready(&self) {
        // Waiters hold their own receiver clones, so send can only fail if
        // every receiver is gone, which is harmless here.
        let _ = self.ready_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(SlskdClient::with_url("http://localhost:1", ""), "tester")
    }

    #[test]
    fn starts_logged_out() {
        let session = test_session();
        assert!(!session.is_logged_in());
        assert_eq!(session.username(), "tester");
    }

    #[tokio::test]
    async fn wait_for_login_times_out_when_never_ready() {
        let session = test_session();
        let ready = session.wait_for_login(Duration::from_millis(20)).await;
        assert!(!ready);
    }

    #[tokio::test]
    async fn wait_for_login_returns_immediately_once_ready() {
        let session = test_session();
        session.mark_ready();
        assert!(session.is_logged_in());
        assert!(session.wait_for_login(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn waiters_are_released_by_mark_ready() {
        let session = std::sync::Arc::new(test_session());
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait_for_login(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.mark_ready();
        assert!(waiter.await.unwrap());
    }
}
