// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download orchestration.
//!
//! Dispatches transfer requests to the gateway and runs one bounded
//! monitoring task per download, updating a shared status table that
//! callers poll by composite id. Records persist until explicit
//! cancellation or process restart; there is no automatic pruning of
//! completed downloads.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::gateway::{EnqueueFile, SlskdClient};
use crate::library::MetadataStore;

use super::types::{
    percent, time_remaining, DownloadId, DownloadOverview, DownloadRecord, DownloadStatus,
    TransferState,
};

/// Monitoring round budget: one round per second, a 5-minute ceiling.
const MONITOR_ROUNDS: u32 = 300;

/// Delay between monitoring rounds.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Orchestrates transfer dispatch, background monitoring, and status
/// tracking. Shared maps are guarded by coarse per-map locks; updates
/// replace whole values.
pub struct DownloadManager {
    client: SlskdClient,
    metadata: Arc<MetadataStore>,
    records: Arc<RwLock<HashMap<DownloadId, DownloadRecord>>>,
    status: Arc<RwLock<HashMap<DownloadId, DownloadStatus>>>,
    monitor_rounds: u32,
    monitor_interval: Duration,
}

impl DownloadManager {
    pub fn new(client: SlskdClient, metadata: Arc<MetadataStore>) -> Self {
        Self {
            client,
            metadata,
            records: Arc::new(RwLock::new(HashMap::new())),
            status: Arc::new(RwLock::new(HashMap::new())),
            monitor_rounds: MONITOR_ROUNDS,
            monitor_interval: MONITOR_INTERVAL,
        }
    }

    /// Override the monitoring round budget and tick interval.
    pub fn with_monitor_limits(mut self, rounds: u32, interval: Duration) -> Self {
        self.monitor_rounds = rounds;
        self.monitor_interval = interval;
        self
    }

    /// Request a download and start monitoring it.
    ///
    /// Returns the composite id immediately after the gateway accepts the
    /// enqueue. Unlike search dispatch, a failure here propagates to the
    /// caller; there is nothing useful to degrade to.
    pub async fn download(
        &self,
        username: &str,
        file_path: &str,
        size: u64,
        metadata: Option<Value>,
    ) -> Result<DownloadId> {
        let id = self.track(username, file_path, size, metadata);

        self.client
            .enqueue(
                username,
                &[EnqueueFile {
                    filename: file_path.to_string(),
                    size,
                }],
            )
            .await
            .context("Transfer enqueue failed")?;

        let _monitor = self.spawn_monitor(id.clone());
        tracing::info!(%id, size, "Download started");
        Ok(id)
    }

    /// Record the download locally before dispatch: metadata stashed under
    /// both the composite id and the bare filename (file-system events
    /// later only know the filename), record timestamped, status queued.
    fn track(
        &self,
        username: &str,
        file_path: &str,
        size: u64,
        metadata: Option<Value>,
    ) -> DownloadId {
        let id = DownloadId::new(username, file_path);
        let file_name = id.file_name().to_string();

        if let Some(ref meta) = metadata {
            self.metadata.stash(id.to_string(), meta.clone());
            self.metadata.stash(file_name.clone(), meta.clone());
        }

        let record = DownloadRecord {
            id: id.clone(),
            file_name,
            metadata,
            size,
            started_at: Utc::now(),
        };

        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), record);
        self.status
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), DownloadStatus::queued(size));

        id
    }

    /// Tracked status for a transfer, or the synthesized "Not started"
    /// status when the composite key is unknown.
    pub fn status(&self, username: &str, file_path: &str) -> DownloadStatus {
        let id = DownloadId::new(username, file_path);
        self.status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .unwrap_or_else(DownloadStatus::not_started)
    }

    /// Stop tracking a download and ask the gateway to cancel it.
    ///
    /// Local bookkeeping is cleared first and never rolled back: the
    /// user-visible contract is "stop tracking this download" whether or
    /// not the remote peer honors the cancel. Unknown ids are a no-op.
    pub async fn cancel(&self, id: &DownloadId) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        self.status
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);

        if let Err(e) = self
            .client
            .cancel_download(id.username(), id.file_path())
            .await
        {
            tracing::warn!(%id, error = %format!("{:#}", e), "Remote cancel failed, local tracking already cleared");
        } else {
            tracing::info!(%id, "Download cancelled");
        }
    }

    /// All tracked downloads joined with their status, newest first.
    pub fn list_all(&self) -> Vec<DownloadOverview> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let status = self.status.read().unwrap_or_else(|e| e.into_inner());

        let mut overviews: Vec<DownloadOverview> = records
            .values()
            .map(|record| {
                let status = status
                    .get(&record.id)
                    .cloned()
                    .unwrap_or_else(|| DownloadStatus::queued(record.size));
                DownloadOverview {
                    id: record.id.to_string(),
                    file_name: record.file_name.clone(),
                    file_path: record.id.file_path().to_string(),
                    path: record.id.file_path().to_string(),
                    username: record.id.username().to_string(),
                    size: record.size,
                    metadata: record.metadata.clone(),
                    timestamp: record.started_at,
                    time_remaining: time_remaining(status.progress, status.total, status.speed),
                    status: status.state,
                    progress: status.progress,
                    total: status.total,
                    percent: status.percent,
                    speed: status.speed,
                    queue_position: status.queue_position,
                    error_message: status.error_message,
                }
            })
            .collect();

        overviews.sort_by_key(|o| Reverse(o.timestamp));
        overviews
    }

    /// Number of transfers currently in the Downloading state.
    pub fn active_count(&self) -> usize {
        self.status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|s| s.state == TransferState::Downloading)
            .count()
    }

    /// Spawn the bounded monitoring loop for one transfer.
    ///
    /// Each round scans the gateway's transfer listing for the tracked
    /// path and replaces the status snapshot. The task stops early on a
    /// terminal state; if the budget runs out while the transfer is still
    /// live, the status is marked timed out rather than left stalling
    /// silently. Round failures are retried next tick.
    fn spawn_monitor(&self, id: DownloadId) -> JoinHandle<()> {
        let client = self.client.clone();
        let status_map = Arc::clone(&self.status);
        let rounds = self.monitor_rounds;
        let interval = self.monitor_interval;

        tokio::spawn(async move {
            for round in 0..rounds {
                match client.downloads(id.username()).await {
                    Ok(listing) => {
                        let transfer = listing
                            .directories
                            .iter()
                            .flat_map(|d| d.files.iter())
                            .find(|f| f.filename == id.file_path());

                        if let Some(transfer) = transfer {
                            let state = TransferState::from_gateway(&transfer.state);
                            let terminal = state.is_terminal();
                            let snapshot = DownloadStatus {
                                percent: percent(transfer.bytes_transferred, transfer.size),
                                state,
                                progress: transfer.bytes_transferred,
                                total: transfer.size,
                                speed: transfer.average_speed,
                                queue_position: None,
                                error_message: None,
                            };

                            status_map
                                .write()
                                .unwrap_or_else(|e| e.into_inner())
                                .insert(id.clone(), snapshot);

                            if terminal {
                                tracing::info!(%id, round, "Transfer reached a terminal state");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%id, round, error = %e, "Monitor round failed");
                    }
                }
                tokio::time::sleep(interval).await;
            }

            // Budget exhausted without a terminal state.
            let mut status = status_map.write().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = status.get_mut(&id) {
                if !entry.state.is_terminal() {
                    entry.state = TransferState::TimedOut;
                    tracing::warn!(%id, "Monitoring budget exhausted, marking transfer timed out");
                }
            }
        })
    }
}
