// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runtime configuration.
//!
//! Everything is sourced from environment variables with sensible defaults,
//! matching how the daemon itself is usually deployed alongside this
//! backend. CLI flags (see `main.rs`) override the environment.

use std::path::PathBuf;

/// Default slskd endpoint.
const DEFAULT_SLSKD_URL: &str = "http://localhost:5030";

/// Directory name for the music data folder under the user's home.
const DATA_DIR_NAME: &str = "Resona";

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the slskd daemon.
    pub slskd_url: String,
    /// API key sent as `X-API-Key` on every gateway request.
    pub slskd_api_key: String,
    /// Soulseek username the daemon logs in with.
    pub username: String,
    /// Soulseek password. Only held for completeness; the daemon owns the
    /// actual credentials.
    pub password: String,
    /// Root data directory (downloads land under it).
    pub data_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self {
            slskd_url: std::env::var("SLSKD_URL")
                .unwrap_or_else(|_| DEFAULT_SLSKD_URL.to_string()),
            slskd_api_key: std::env::var("SLSKD_API_KEY").unwrap_or_default(),
            username: std::env::var("SOULSEEK_USERNAME").unwrap_or_default(),
            password: std::env::var("SOULSEEK_PASSWORD").unwrap_or_default(),
            data_path: default_data_path(),
        }
    }

    /// Directory the daemon writes finished downloads into.
    pub fn download_dir(&self) -> PathBuf {
        self.data_path.join("downloads")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slskd_url: DEFAULT_SLSKD_URL.to_string(),
            slskd_api_key: String::new(),
            username: String::new(),
            password: String::new(),
            data_path: default_data_path(),
        }
    }
}

/// Default data path under the user's home directory.
fn default_data_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}
