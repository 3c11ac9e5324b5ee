//! slskd gateway client.
//!
//! Thin async wrapper over the HTTP API of a locally running
//! [slskd](https://github.com/slskd/slskd) daemon, which performs the actual
//! Soulseek network search and file transfer. Resona only dispatches
//! requests and polls state through this client; the peer-to-peer protocol
//! itself never enters this codebase.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default slskd endpoint.
const DEFAULT_SLSKD_URL: &str = "http://localhost:5030";

/// Timeout for establishing a connection to the daemon.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Timeout for individual API requests.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Connection state reported by the daemon's server endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    /// Raw state string, e.g. "Connected" or "Disconnected".
    pub state: String,
    /// Username the daemon is logged in as, when connected.
    #[serde(default)]
    pub username: Option<String>,
}

impl ServerState {
    /// True when the daemon reports an established Soulseek connection.
    pub fn is_connected(&self) -> bool {
        self.state == "Connected"
    }

    /// True when the daemon reports no Soulseek connection at all.
    pub fn is_disconnected(&self) -> bool {
        self.state == "Disconnected"
    }
}

/// A dispatched search as tracked by the daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    /// Daemon-assigned search identifier.
    pub id: String,
}

/// One peer's response to a search: connection quality plus shared files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerResponse {
    pub username: String,
    /// Number of transfers already queued at this peer.
    #[serde(default)]
    pub queue_length: u32,
    /// Peer upload speed in bytes per second.
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub files: Vec<SharedFile>,
}

/// A single file offered within a peer response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub bit_rate: u32,
    /// Track duration in seconds.
    #[serde(default)]
    pub length: u32,
}

/// A file descriptor sent when enqueueing a transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueFile {
    pub filename: String,
    pub size: u64,
}

/// Transfer listing for one user: a tree of directories and files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferListing {
    #[serde(default)]
    pub directories: Vec<TransferDirectory>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDirectory {
    #[serde(default)]
    pub files: Vec<TransferFile>,
}

/// Per-file transfer progress as reported by the daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFile {
    pub filename: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub bytes_transferred: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub average_speed: f64,
}

/// Client for the slskd HTTP API.
#[derive(Debug, Clone)]
pub struct SlskdClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SlskdClient {
    /// Create a client against the default endpoint with no API key.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_SLSKD_URL, "")
    }

    /// Create a client against a custom endpoint.
    pub fn with_url(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header("X-API-Key", &self.api_key)
        }
    }

    /// Query the daemon's Soulseek connection state.
    pub async fn server_state(&self) -> Result<ServerState> {
        let response = self
            .request(reqwest::Method::GET, self.url("/server"))
            .send()
            .await
            .context("Failed to reach slskd server endpoint")?
            .error_for_status()
            .context("slskd server endpoint returned an error")?;

        response
            .json()
            .await
            .context("Failed to parse slskd server state")
    }

    /// Ask the daemon to connect to the Soulseek network.
    pub async fn connect(&self) -> Result<()> {
        self.request(reqwest::Method::PUT, self.url("/server"))
            .send()
            .await
            .context("Failed to issue slskd connect command")?
            .error_for_status()
            .context("slskd rejected the connect command")?;
        Ok(())
    }

    /// Dispatch a text search, capping each peer response at `file_limit`
    /// files. Returns the daemon-assigned search entry.
    pub async fn search(&self, text: &str, file_limit: u32) -> Result<SearchEntry> {
        let body = serde_json::json!({
            "searchText": text,
            "fileLimit": file_limit,
        });

        let response = self
            .request(reqwest::Method::POST, self.url("/searches"))
            .json(&body)
            .send()
            .await
            .context("Failed to dispatch search to slskd")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("slskd search dispatch failed ({}): {}", status, detail);
        }

        response
            .json()
            .await
            .context("Failed to parse slskd search entry")
    }

    /// Fetch every peer response received so far for a search.
    pub async fn search_responses(&self, search_id: &str) -> Result<Vec<PeerResponse>> {
        let response = self
            .request(
                reqwest::Method::GET,
                self.url(&format!("/searches/{}/responses", search_id)),
            )
            .send()
            .await
            .context("Failed to poll slskd search responses")?
            .error_for_status()
            .context("slskd search responses endpoint returned an error")?;

        response
            .json()
            .await
            .context("Failed to parse slskd search responses")
    }

    /// Enqueue a transfer of the given files from a user.
    pub async fn enqueue(&self, username: &str, files: &[EnqueueFile]) -> Result<()> {
        let url = self.download_url(username, None)?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(files)
            .send()
            .await
            .context("Failed to enqueue transfer at slskd")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("slskd transfer enqueue failed ({}): {}", status, detail);
        }
        Ok(())
    }

    /// Fetch the current transfer listing for a user.
    pub async fn downloads(&self, username: &str) -> Result<TransferListing> {
        let url = self.download_url(username, None)?;
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .context("Failed to fetch slskd transfer listing")?
            .error_for_status()
            .context("slskd transfer listing endpoint returned an error")?;

        response
            .json()
            .await
            .context("Failed to parse slskd transfer listing")
    }

    /// Request cancellation of a transfer identified by user and file path.
    pub async fn cancel_download(&self, username: &str, file_path: &str) -> Result<()> {
        let url = self.download_url(username, Some(file_path))?;
        self.request(reqwest::Method::DELETE, url)
            .send()
            .await
            .context("Failed to issue slskd transfer cancel")?
            .error_for_status()
            .context("slskd rejected the transfer cancel")?;
        Ok(())
    }

    /// Build a transfer URL, percent-encoding username and optional file
    /// path as path segments (Soulseek paths contain backslashes).
    fn download_url(&self, username: &str, file_path: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.url("/transfers/downloads"))
            .context("Invalid slskd base URL")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("slskd base URL cannot have path segments"))?;
            segments.push(username);
            if let Some(path) = file_path {
                segments.push(path);
            }
        }
        Ok(url)
    }
}

impl Default for SlskdClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_state_connected() {
        let state: ServerState =
            serde_json::from_str(r#"{"state": "Connected", "username": "resona"}"#).unwrap();
        assert!(state.is_connected());
        assert!(!state.is_disconnected());
        assert_eq!(state.username.as_deref(), Some("resona"));
    }

    #[test]
    fn server_state_disconnected() {
        let state: ServerState = serde_json::from_str(r#"{"state": "Disconnected"}"#).unwrap();
        assert!(state.is_disconnected());
        assert!(!state.is_connected());
    }

    #[test]
    fn search_entry_keeps_only_the_id() {
        // The daemon sends more bookkeeping than the client consumes.
        let entry: SearchEntry =
            serde_json::from_str(r#"{"id": "abc-123", "isComplete": true, "fileCount": 7}"#)
                .unwrap();
        assert_eq!(entry.id, "abc-123");
    }

    #[test]
    fn peer_response_deserializes() {
        let json = r#"[{
            "username": "collector",
            "queueLength": 0,
            "uploadSpeed": 250000,
            "files": [
                {"filename": "Music\\artist - song.flac", "size": 12345678,
                 "isLocked": false, "bitRate": 1024, "length": 215}
            ]
        }]"#;
        let responses: Vec<PeerResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].username, "collector");
        assert_eq!(responses[0].files[0].bit_rate, 1024);
        assert_eq!(responses[0].files[0].length, 215);
    }

    #[test]
    fn peer_response_defaults_missing_fields() {
        let json = r#"[{"username": "sparse"}]"#;
        let responses: Vec<PeerResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(responses[0].queue_length, 0);
        assert_eq!(responses[0].upload_speed, 0);
        assert!(responses[0].files.is_empty());
    }

    #[test]
    fn transfer_listing_deserializes() {
        let json = r#"{
            "directories": [{
                "files": [{
                    "filename": "Music\\a.mp3",
                    "state": "InProgress",
                    "bytesTransferred": 500,
                    "size": 1000,
                    "averageSpeed": 42.5
                }]
            }]
        }"#;
        let listing: TransferListing = serde_json::from_str(json).unwrap();
        let file = &listing.directories[0].files[0];
        assert_eq!(file.bytes_transferred, 500);
        assert_eq!(file.state, "InProgress");
        assert!((file.average_speed - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = SlskdClient::with_url("http://localhost:5030/", "key");
        assert_eq!(client.url("/server"), "http://localhost:5030/api/v0/server");
    }

    #[test]
    fn download_url_encodes_path_segments() {
        let client = SlskdClient::with_url("http://localhost:5030", "");
        let url = client
            .download_url("peer", Some("Music\\album\\track.flac"))
            .unwrap();
        let rendered = url.as_str();
        assert!(rendered.starts_with("http://localhost:5030/api/v0/transfers/downloads/peer/"));
        assert!(!rendered.contains('\\'));
    }
}
