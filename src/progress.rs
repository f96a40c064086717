// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while aggregating the configured feeds
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A feed request went out
    FetchingFeed { url: String },

    /// A feed was fetched and normalized
    FeedLoaded {
        url: String,
        title: String,
        episode_count: usize,
    },

    /// A feed failed and was replaced by a placeholder
    FeedFailed { url: String, error: String },

    /// Every feed in the batch has settled
    AggregationCompleted {
        loaded_count: usize,
        failed_count: usize,
        episode_count: usize,
    },
}

/// Receives aggregation events as feeds settle. Called from inside the
/// concurrent fetch, so implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// Drops every event (quiet mode)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
