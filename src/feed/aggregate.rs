// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use futures::future::join_all;
use tracing::{info, warn};

use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::fetch::FeedSource;
use super::model::Feed;

/// A feed that could not be loaded in the last pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub url: String,
    pub error: String,
    /// Network/HTTP failure as opposed to a malformed payload
    pub network: bool,
}

/// Fetches the configured feed list concurrently.
///
/// A failing feed becomes an empty placeholder in its slot; the pass as a
/// whole always succeeds.
pub struct FeedAggregator<S> {
    source: S,
    reporter: SharedProgressReporter,
    urls: Vec<String>,
    failures: Vec<FeedFailure>,
}

impl<S: FeedSource> FeedAggregator<S> {
    pub fn new(source: S, reporter: SharedProgressReporter) -> Self {
        Self {
            source,
            reporter,
            urls: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Fetch every URL at once and return one feed per URL, in order
    pub async fn load_all(&mut self, urls: &[String]) -> Vec<Feed> {
        self.urls = urls.to_vec();

        let source = &self.source;
        let reporter = &self.reporter;
        let results = join_all(urls.iter().map(|url| async move {
            reporter.report(ProgressEvent::FetchingFeed { url: url.clone() });
            (url, source.fetch(url).await)
        }))
        .await;

        let mut failures = Vec::new();
        let feeds: Vec<Feed> = results
            .into_iter()
            .map(|(url, result)| match result {
                Ok(feed) => {
                    reporter.report(ProgressEvent::FeedLoaded {
                        url: url.clone(),
                        title: feed.title.clone(),
                        episode_count: feed.episodes.len(),
                    });
                    feed
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Feed unavailable, using placeholder");
                    reporter.report(ProgressEvent::FeedFailed {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                    failures.push(FeedFailure {
                        url: url.clone(),
                        error: e.to_string(),
                        network: e.is_network(),
                    });
                    Feed::placeholder(url, e.to_string())
                }
            })
            .collect();

        let episode_count = feeds.iter().map(|f| f.episodes.len()).sum();
        info!(
            feeds = feeds.len(),
            failed = failures.len(),
            episodes = episode_count,
            "Feed aggregation finished"
        );
        reporter.report(ProgressEvent::AggregationCompleted {
            loaded_count: feeds.len() - failures.len(),
            failed_count: failures.len(),
            episode_count,
        });

        self.failures = failures;
        feeds
    }

    /// Re-run the last aggregation with the same URL list
    pub async fn retry(&mut self) -> Vec<Feed> {
        let urls = self.urls.clone();
        self.load_all(&urls).await
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Failures from the most recent pass
    pub fn failures(&self) -> &[FeedFailure] {
        &self.failures
    }

    /// Retry-able banner text, if anything failed last time
    pub fn error_banner(&self) -> Option<String> {
        match self.failures.len() {
            0 => None,
            1 => Some(format!("Failed to load 1 feed: {}", self.failures[0].url)),
            n => Some(format!("Failed to load {n} feeds")),
        }
    }
}
