// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Search completion detection.
//!
//! The daemon never sends a synchronous "search done" signal, so consumers
//! poll results and need telling when to stop. The tracker watches the
//! result count across successive calls: once it holds steady for three
//! calls (a "stable round" streak) the search is declared complete.

use std::collections::HashMap;

use super::types::SearchToken;

/// Consecutive stable calls (same non-zero count) before completion fires.
const STABLE_CALLS_FOR_COMPLETION: u32 = 3;

/// Result count at which a search is complete regardless of stability.
const RESULT_COUNT_CEILING: usize = 100;

/// Per-token stable-round bookkeeping, evaluated on each results call
/// rather than inside the background poll task.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    last_count: HashMap<SearchToken, usize>,
    stable_calls: HashMap<SearchToken, u32>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one results call and report whether the search is complete.
    ///
    /// A call is stable when its count matches the previous call's count
    /// and is non-zero; any change resets the streak. Completion fires on
    /// a streak of three, on reaching the count ceiling, or when the
    /// search is no longer active while holding at least one result.
    ///
    /// On completion the token's counters are discarded, so a later call
    /// for the same token starts a fresh streak.
    pub fn observe(&mut self, token: SearchToken, count: usize, active: bool) -> bool {
        let last = self.last_count.entry(token).or_insert(0);
        let stable = self.stable_calls.entry(token).or_insert(0);

        if count == *last && count > 0 {
            *stable += 1;
        } else {
            *stable = 0;
        }
        *last = count;

        let complete = (count > 0 && *stable >= STABLE_CALLS_FOR_COMPLETION)
            || count >= RESULT_COUNT_CEILING
            || (!active && count > 0);

        if complete {
            self.last_count.remove(&token);
            self.stable_calls.remove(&token);
        }
        complete
    }

    /// Number of tokens currently tracked.
    pub fn tracked(&self) -> usize {
        self.stable_calls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: SearchToken = SearchToken(1);

    #[test]
    fn unknown_token_is_never_complete() {
        let mut tracker = CompletionTracker::new();
        assert!(!tracker.observe(TOKEN, 0, false));
        assert!(!tracker.observe(TOKEN, 0, false));
    }

    #[test]
    fn completes_after_three_stable_calls() {
        let mut tracker = CompletionTracker::new();
        assert!(!tracker.observe(TOKEN, 5, true)); // first sighting, streak 0
        assert!(!tracker.observe(TOKEN, 5, true)); // streak 1
        assert!(!tracker.observe(TOKEN, 5, true)); // streak 2
        assert!(tracker.observe(TOKEN, 5, true)); // streak 3
    }

    #[test]
    fn count_change_resets_the_streak() {
        let mut tracker = CompletionTracker::new();
        let counts = [5usize, 5, 5, 7, 7, 7, 7];
        let outcomes: Vec<bool> = counts
            .iter()
            .map(|&c| tracker.observe(TOKEN, c, true))
            .collect();
        // Completion fires exactly on the 4th call after the change to 7.
        assert_eq!(outcomes, [false, false, false, false, false, false, true]);
    }

    #[test]
    fn zero_counts_never_build_a_streak() {
        let mut tracker = CompletionTracker::new();
        for _ in 0..10 {
            assert!(!tracker.observe(TOKEN, 0, true));
        }
    }

    #[test]
    fn count_ceiling_completes_immediately() {
        let mut tracker = CompletionTracker::new();
        assert!(tracker.observe(TOKEN, 100, true));
    }

    #[test]
    fn inactive_search_with_results_completes() {
        let mut tracker = CompletionTracker::new();
        assert!(tracker.observe(TOKEN, 1, false));
    }

    #[test]
    fn inactive_search_without_results_does_not_complete() {
        let mut tracker = CompletionTracker::new();
        assert!(!tracker.observe(TOKEN, 0, false));
    }

    #[test]
    fn counters_pruned_on_completion() {
        let mut tracker = CompletionTracker::new();
        assert!(tracker.observe(TOKEN, 100, true));
        assert_eq!(tracker.tracked(), 0);
        // A stale token starts counting fresh.
        assert!(!tracker.observe(TOKEN, 5, true));
        assert_eq!(tracker.tracked(), 1);
    }
}
