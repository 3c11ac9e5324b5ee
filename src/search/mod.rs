// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Soulseek search orchestration.
//!
//! A search is fire-and-forget: [`SearchOrchestrator::search`] allocates a
//! token, dispatches the query to the gateway, and spawns a bounded polling
//! task that filters, ranks, and caches results keyed by that token. The
//! caller pulls snapshots with [`SearchOrchestrator::results`] until the
//! completion heuristic says to stop.
//!
//! ```text
//! caller ──search()──▶ SearchOrchestrator ──spawn──▶ poll task (≤4 rounds)
//!   ▲                        │                            │
//!   └──results(token)────────┴◀── ranked snapshot ────────┘
//! ```

pub mod completion;
pub mod orchestrator;
pub mod types;

pub use completion::CompletionTracker;
pub use orchestrator::{
    build_effective_query, SearchError, SearchOrchestrator, SearchResults, StartedSearch,
};
pub use types::{FileCandidate, SearchToken};
