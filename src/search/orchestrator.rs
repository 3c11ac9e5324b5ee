// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Search orchestration.
//!
//! Issues searches against the gateway, allocates tokens, and runs one
//! bounded background polling task per search. Callers get the token back
//! immediately and pull ranked results with [`SearchOrchestrator::results`]
//! until the completion heuristic fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::gateway::SlskdClient;

use super::completion::CompletionTracker;
use super::types::{
    admit_file, peer_admitted, rank_and_truncate, FileCandidate, SearchToken,
};

/// File cap sent with each search dispatch.
const SEARCH_FILE_LIMIT: u32 = 20;

/// Number of background polling rounds per search.
const POLL_ROUNDS: u32 = 4;

/// Delay between polling rounds.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Search dispatch failures that are surfaced distinctly rather than
/// degraded to a missing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The gateway reported the search as cancelled before it started.
    Cancelled,
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::Cancelled => write!(f, "Search was cancelled"),
        }
    }
}

impl std::error::Error for SearchError {}

/// Outcome of a successfully dispatched (or degraded) search request.
#[derive(Debug, Clone)]
pub struct StartedSearch {
    /// Allocated token, or `None` when dispatch failed.
    pub token: Option<SearchToken>,
    /// The query text actually sent to the network.
    pub effective_query: String,
}

/// One pull of results for a token.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub results: Vec<FileCandidate>,
    pub is_complete: bool,
    pub result_count: usize,
    pub actual_query: String,
}

/// Orchestrates search dispatch, background polling, and result caching.
///
/// All shared maps are owned here and guarded by coarse per-map locks;
/// background tasks replace whole values rather than editing in place.
pub struct SearchOrchestrator {
    client: SlskdClient,
    next_token: AtomicU64,
    results: Arc<RwLock<HashMap<SearchToken, Vec<FileCandidate>>>>,
    queries: Arc<RwLock<HashMap<SearchToken, String>>>,
    /// Live polling tasks by token. Doubles as the liveness flag feeding
    /// the completion heuristic, and gives a future search-cancellation
    /// operation a handle to abort through.
    active: Mutex<HashMap<SearchToken, JoinHandle<()>>>,
    completion: Mutex<CompletionTracker>,
}

impl SearchOrchestrator {
    pub fn new(client: SlskdClient) -> Self {
        Self {
            client,
            next_token: AtomicU64::new(1),
            results: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(HashMap::new())),
            active: Mutex::new(HashMap::new()),
            completion: Mutex::new(CompletionTracker::new()),
        }
    }

    /// Dispatch a search and start its background polling task.
    ///
    /// Returns immediately with the allocated token and the effective
    /// query text. A generic dispatch failure degrades to a `None` token;
    /// a gateway-reported cancellation is surfaced as
    /// [`SearchError::Cancelled`] instead.
    pub async fn search(
        &self,
        artist: Option<&str>,
        song: Option<&str>,
        raw_query: &str,
    ) -> Result<StartedSearch, SearchError> {
        let effective_query = build_effective_query(artist, song, raw_query);
        let token = self.allocate_token();

        let entry = match self.client.search(&effective_query, SEARCH_FILE_LIMIT).await {
            Ok(entry) => entry,
            Err(e) if error_is_cancelled(&e) => {
                tracing::warn!(%token, "Search dispatch reported cancelled");
                return Err(SearchError::Cancelled);
            }
            Err(e) => {
                tracing::error!(%token, error = %format!("{:#}", e), "Search dispatch failed");
                return Ok(StartedSearch {
                    token: None,
                    effective_query: raw_query.to_string(),
                });
            }
        };

        self.write_results(token, Vec::new());
        self.queries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, effective_query.clone());

        let handle = self.spawn_poll_task(token, entry.id);
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, handle);

        tracing::info!(%token, query = %effective_query, "Search dispatched");
        Ok(StartedSearch {
            token: Some(token),
            effective_query,
        })
    }

    /// Pull the cached results for a token and evaluate the completion
    /// heuristic. Unknown tokens yield an empty, incomplete result set.
    pub fn results(&self, token: SearchToken) -> SearchResults {
        let results = self
            .results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&token)
            .cloned()
            .unwrap_or_default();
        let result_count = results.len();

        let active = self.is_active(token);
        let is_complete = self
            .completion
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observe(token, result_count, active);

        let actual_query = self
            .queries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&token)
            .cloned()
            .unwrap_or_default();

        SearchResults {
            results,
            is_complete,
            result_count,
            actual_query,
        }
    }

    /// Whether the polling task for a token is still running. Finished
    /// entries are pruned as they are observed.
    pub fn is_active(&self, token: SearchToken) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.retain(|_, handle| !handle.is_finished());
        active.contains_key(&token)
    }

    fn allocate_token(&self) -> SearchToken {
        SearchToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn write_results(&self, token: SearchToken, results: Vec<FileCandidate>) {
        self.results
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, results);
    }

    /// Spawn the bounded polling loop for one search.
    ///
    /// Each round fetches everything the gateway has accumulated so far,
    /// filters and ranks it, and replaces the cached snapshot wholesale.
    /// A failed round is retried on the next tick; the task never aborts
    /// the search over a single bad fetch.
    fn spawn_poll_task(&self, token: SearchToken, search_id: String) -> JoinHandle<()> {
        let client = self.client.clone();
        let results = Arc::clone(&self.results);

        tokio::spawn(async move {
            for round in 0..POLL_ROUNDS {
                match client.search_responses(&search_id).await {
                    Ok(responses) => {
                        let mut candidates: Vec<FileCandidate> = responses
                            .iter()
                            .filter(|r| peer_admitted(r))
                            .flat_map(|r| r.files.iter().filter_map(|f| admit_file(r, f)))
                            .collect();
                        rank_and_truncate(&mut candidates);

                        results
                            .write()
                            .unwrap_or_else(|e| e.into_inner())
                            .insert(token, candidates);
                    }
                    Err(e) => {
                        tracing::debug!(%token, round, error = %e, "Search poll round failed");
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            tracing::debug!(%token, "Search polling finished");
        })
    }
}

/// Build the query text actually sent to the network.
///
/// When both artist and song are present, any leading
/// "original-artist · localized-artist" marker is stripped down to the text
/// after the separator, and artist and song are joined with a space.
/// Otherwise the raw query is used verbatim.
pub fn build_effective_query(artist: Option<&str>, song: Option<&str>, raw_query: &str) -> String {
    match (artist, song) {
        (Some(artist), Some(song)) => {
            let artist = match artist.find('·') {
                Some(pos) => artist[pos + '·'.len_utf8()..].trim(),
                None => artist,
            };
            format!("{} {}", artist, song)
        }
        _ => raw_query.to_string(),
    }
}

/// Whether a dispatch error chain identifies a gateway-side cancellation.
fn error_is_cancelled(error: &anyhow::Error) -> bool {
    format!("{:#}", error).to_lowercase().contains("cancelled")
}
