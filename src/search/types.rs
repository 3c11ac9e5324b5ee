// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Search result types and the admission/ranking policy.

use serde::Serialize;
use std::cmp::Reverse;

use crate::gateway::{PeerResponse, SharedFile};

/// Minimum peer upload speed admitted, in bytes per second (100 KiB/s).
pub const MIN_UPLOAD_SPEED: u64 = 102_400;

/// Maximum admitted file size (25 MiB).
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Admitted audio file extensions, lowercase with leading dot.
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".flac", ".mp3", ".wav"];

/// Maximum number of candidates kept per search round.
pub const RESULT_LIMIT: usize = 20;

/// Opaque handle identifying one search session. Monotonically increasing,
/// starting at 1, never reused for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SearchToken(pub u64);

impl std::fmt::Display for SearchToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SearchToken {
    fn from(value: u64) -> Self {
        SearchToken(value)
    }
}

/// A downloadable file surviving the admission filters. Immutable once
/// built from a peer response; each poll round replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCandidate {
    /// Remote path as shared by the peer (backslash-separated).
    pub path: String,
    pub size: u64,
    /// Lowercase extension including the dot.
    pub extension: String,
    /// Peer offering the file.
    pub username: String,
    pub bitrate: u32,
    /// Quality score. Bitrate stands in for quality; nothing is decoded
    /// or probed.
    pub quality: u32,
    /// Track duration formatted as M:SS.
    #[serde(rename = "length")]
    pub duration: String,
    /// Transfers already queued at the peer.
    pub queue_count: u32,
    /// Peer upload speed in bytes per second.
    pub upload_speed: u64,
    pub is_locked: bool,
}

impl FileCandidate {
    /// Ordering priority for the candidate's format: lossless first.
    fn format_priority(&self) -> u8 {
        if self.extension == ".flac" {
            0
        } else {
            1
        }
    }
}

/// Whether a whole peer response is admitted. Slow or busy peers are
/// rejected outright: only idle peers with decent upload speed are worth
/// queueing against, trading eventual throughput for immediate
/// availability.
pub fn peer_admitted(response: &PeerResponse) -> bool {
    response.upload_speed >= MIN_UPLOAD_SPEED && response.queue_length == 0
}

/// Build a candidate from a file within an admitted response, or reject it.
pub fn admit_file(response: &PeerResponse, file: &SharedFile) -> Option<FileCandidate> {
    if file.is_locked {
        return None;
    }
    if file.size > MAX_FILE_SIZE {
        return None;
    }
    let extension = file_extension(&file.filename);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    Some(FileCandidate {
        path: file.filename.clone(),
        size: file.size,
        extension,
        username: response.username.clone(),
        bitrate: file.bit_rate,
        quality: file.bit_rate,
        duration: format_duration(file.length),
        queue_count: response.queue_length,
        upload_speed: response.upload_speed,
        is_locked: false,
    })
}

/// Rank candidates in place and truncate to [`RESULT_LIMIT`].
///
/// The composite key sorts lossless files first, then by descending
/// bitrate, then by ascending peer queue length as a tiebreaker.
pub fn rank_and_truncate(candidates: &mut Vec<FileCandidate>) {
    candidates.sort_by_key(|c| (c.format_priority(), Reverse(c.bitrate), c.queue_count));
    candidates.truncate(RESULT_LIMIT);
}

/// Lowercase file extension including the dot, empty when there is none.
pub fn file_extension(path: &str) -> String {
    let basename = path.rsplit(['\\', '/']).next().unwrap_or(path);
    match basename.rfind('.') {
        Some(pos) if pos > 0 => basename[pos..].to_lowercase(),
        _ => String::new(),
    }
}

/// Convert seconds to an M:SS display string.
pub fn format_duration(seconds: u32) -> String {
    if seconds == 0 {
        return "0:00".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(upload_speed: u64, queue_length: u32) -> PeerResponse {
        PeerResponse {
            username: "peer".to_string(),
            queue_length,
            upload_speed,
            files: vec![],
        }
    }

    fn file(filename: &str, size: u64, locked: bool, bit_rate: u32) -> SharedFile {
        SharedFile {
            filename: filename.to_string(),
            size,
            is_locked: locked,
            bit_rate,
            length: 180,
        }
    }

    fn candidate(extension: &str, bitrate: u32, queue_count: u32) -> FileCandidate {
        FileCandidate {
            path: format!("Music\\track{}", extension),
            size: 1024,
            extension: extension.to_string(),
            username: "peer".to_string(),
            bitrate,
            quality: bitrate,
            duration: "3:00".to_string(),
            queue_count,
            upload_speed: MIN_UPLOAD_SPEED,
            is_locked: false,
        }
    }

    #[test]
    fn slow_peer_rejected() {
        assert!(!peer_admitted(&peer(MIN_UPLOAD_SPEED - 1, 0)));
        assert!(peer_admitted(&peer(MIN_UPLOAD_SPEED, 0)));
    }

    #[test]
    fn busy_peer_rejected() {
        assert!(!peer_admitted(&peer(MIN_UPLOAD_SPEED, 1)));
    }

    #[test]
    fn locked_file_rejected() {
        let p = peer(MIN_UPLOAD_SPEED, 0);
        assert!(admit_file(&p, &file("a.flac", 1024, true, 1000)).is_none());
    }

    #[test]
    fn oversized_file_rejected() {
        let p = peer(MIN_UPLOAD_SPEED, 0);
        assert!(admit_file(&p, &file("a.flac", MAX_FILE_SIZE + 1, false, 1000)).is_none());
        assert!(admit_file(&p, &file("a.flac", MAX_FILE_SIZE, false, 1000)).is_some());
    }

    #[test]
    fn disallowed_extension_rejected() {
        let p = peer(MIN_UPLOAD_SPEED, 0);
        assert!(admit_file(&p, &file("a.ogg", 1024, false, 1000)).is_none());
        assert!(admit_file(&p, &file("a.m4a", 1024, false, 1000)).is_none());
        assert!(admit_file(&p, &file("a.mp3", 1024, false, 320)).is_some());
        assert!(admit_file(&p, &file("a.wav", 1024, false, 1411)).is_some());
    }

    #[test]
    fn extension_is_case_insensitive() {
        let p = peer(MIN_UPLOAD_SPEED, 0);
        let admitted = admit_file(&p, &file("Music\\A.FLAC", 1024, false, 1000)).unwrap();
        assert_eq!(admitted.extension, ".flac");
    }

    #[test]
    fn quality_mirrors_bitrate() {
        let p = peer(MIN_UPLOAD_SPEED, 0);
        let admitted = admit_file(&p, &file("a.mp3", 1024, false, 320)).unwrap();
        assert_eq!(admitted.quality, 320);
        assert_eq!(admitted.bitrate, 320);
    }

    #[test]
    fn flac_ranks_before_higher_bitrate_mp3() {
        let mut candidates = vec![candidate(".mp3", 320, 0), candidate(".flac", 100, 0)];
        rank_and_truncate(&mut candidates);
        assert_eq!(candidates[0].extension, ".flac");
    }

    #[test]
    fn same_format_sorted_by_descending_bitrate() {
        let mut candidates = vec![candidate(".mp3", 128, 0), candidate(".mp3", 320, 0)];
        rank_and_truncate(&mut candidates);
        assert_eq!(candidates[0].bitrate, 320);
    }

    #[test]
    fn equal_format_and_bitrate_sorted_by_queue_length() {
        let mut candidates = vec![candidate(".flac", 1000, 5), candidate(".flac", 1000, 0)];
        rank_and_truncate(&mut candidates);
        assert_eq!(candidates[0].queue_count, 0);
    }

    #[test]
    fn truncates_to_result_limit() {
        let mut candidates: Vec<_> = (0..30).map(|i| candidate(".mp3", i, 0)).collect();
        rank_and_truncate(&mut candidates);
        assert_eq!(candidates.len(), RESULT_LIMIT);
    }

    #[test]
    fn extension_of_windows_path() {
        assert_eq!(file_extension("Music\\Album\\01 - Song.Flac"), ".flac");
        assert_eq!(file_extension("plain.mp3"), ".mp3");
        assert_eq!(file_extension("no_extension"), "");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(215), "3:35");
        assert_eq!(format_duration(3600), "60:00");
    }
}
