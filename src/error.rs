// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing a single feed.
///
/// None of these abort an aggregation pass; the failing feed is replaced by
/// an empty placeholder instead.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Failed to parse feed JSON from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid feed structure received from {url}: {reason}")]
    InvalidStructure { url: String, reason: String },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FeedError {
    /// Whether the failure happened on the wire rather than in the payload
    pub fn is_network(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::HttpStatus { .. })
    }
}

/// Failures reported by the audio subsystem for the loaded episode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Failed to load audio for {episode_id}: {message}")]
    Load { episode_id: String, message: String },

    #[error("Network error while playing {episode_id}: {message}")]
    Network { episode_id: String, message: String },

    #[error("Failed to decode audio for {episode_id}: {message}")]
    Decode { episode_id: String, message: String },

    /// A load that was superseded or cancelled. Never shown to the user.
    #[error("Playback of {episode_id} was interrupted")]
    Aborted { episode_id: String },

    #[error("Unexpected playback error for {episode_id}: {message}")]
    Unknown { episode_id: String, message: String },
}

impl PlaybackError {
    pub fn episode_id(&self) -> &str {
        match self {
            Self::Load { episode_id, .. }
            | Self::Network { episode_id, .. }
            | Self::Decode { episode_id, .. }
            | Self::Aborted { episode_id }
            | Self::Unknown { episode_id, .. } => episode_id,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Errors from the key-value store backing the session snapshot.
///
/// These are always swallowed by the persistence adapter.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored snapshot is corrupt: {source}")]
    Corrupt {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Storage is unavailable: {0}")]
    Unavailable(String),
}

/// Rejected input to a session mutator. Logged, never returned to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("invalid time value: {0}")]
    Time(f64),

    #[error("invalid volume value: {0}")]
    Volume(f64),

    #[error("invalid episode id: {0:?}")]
    EpisodeId(String),

    #[error("no episode with id {0:?} in the current feed set")]
    UnknownEpisode(String),

    #[error("episode {0:?} is not playable")]
    Unplayable(String),
}
