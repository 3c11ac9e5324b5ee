// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! resona - Soulseek search and download backend
//!
//! Resona sits between a music client UI and a locally running
//! [slskd](https://github.com/slskd/slskd) daemon. It dispatches searches
//! to the Soulseek network, filters and ranks what comes back, and tracks
//! download progress, all through the daemon's HTTP API.
//!
//! # Core Modules
//!
//! - [`gateway`] - HTTP client for the slskd daemon
//! - [`session`] - Soulseek connection state, gates all network operations
//! - [`search`] - Search dispatch, background result polling, filtering and
//!   ranking, completion detection
//! - [`download`] - Transfer dispatch, background progress monitoring,
//!   cancellation
//! - [`library`] - Metadata stash consumed by enrichment
//! - [`server`] - HTTP API exposed to the UI
//! - [`errors`] - User-facing error taxonomy
//! - [`config`] - Environment-based configuration

pub mod config;
pub mod download;
pub mod errors;
pub mod gateway;
pub mod library;
pub mod search;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use download::{
    DownloadId, DownloadManager, DownloadStatus, MalformedDownloadId, TransferState,
};
pub use errors::UserError;
pub use gateway::SlskdClient;
pub use library::MetadataStore;
pub use search::{FileCandidate, SearchOrchestrator, SearchToken};
pub use server::Server;
pub use session::Session;
