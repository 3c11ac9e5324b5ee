// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download orchestration for Soulseek transfers.
//!
//! A download is fire-and-forget like a search: [`DownloadManager::download`]
//! enqueues the transfer at the gateway, returns the composite id, and
//! spawns a bounded monitoring task that keeps the shared status table
//! current. Callers poll [`DownloadManager::status`] by id until a terminal
//! state.
//!
//! ```text
//! caller ──download()──▶ DownloadManager ──spawn──▶ monitor task (≤300 rounds)
//!   ▲                         │                          │
//!   └──status(user, path)─────┴◀── status snapshot ──────┘
//! ```

pub mod manager;
pub mod types;

pub use manager::DownloadManager;
pub use types::{
    DownloadId, DownloadOverview, DownloadRecord, DownloadStatus, MalformedDownloadId,
    TransferState,
};
