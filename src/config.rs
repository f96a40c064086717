// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

/// A feed the player aggregates on startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: &'static str,
    pub url: &'static str,
    pub description: &'static str,
}

pub const PODCAST_FEEDS: &[FeedConfig] = &[
    FeedConfig {
        name: "Blindboy Podcast",
        url: "https://feeds.acast.com/public/shows/blindboy",
        description: "An eclectic podcast containing short fiction, interviews and comedy",
    },
    FeedConfig {
        name: "Here Comes The Guillotine",
        url: "https://feeds.captivate.fm/here-comes-the-guillotine/",
        description: "A podcast about true crime and dark history",
    },
    FeedConfig {
        name: "Elis James and John Robins",
        url: "https://podcasts.files.bbci.co.uk/m0005fdz.rss",
        description: "BBC Radio 5 Live comedy podcast with big laughs and top quality content",
    },
];

pub const DEFAULT_STORAGE_KEY: &str = "podcast-store";
pub const DEFAULT_EPISODES_PER_PAGE: usize = 10;
pub const DEFAULT_DESCRIPTION_MAX_LENGTH: usize = 150;
pub const DEFAULT_PROGRESS_SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Runtime settings for a player instance
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub feeds: Vec<String>,
    pub progress_save_interval: Duration,
    pub episodes_per_page: usize,
    pub description_max_length: usize,
    pub storage_key: String,
    /// Where the session snapshot lives
    pub data_dir: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            feeds: PODCAST_FEEDS.iter().map(|f| f.url.to_string()).collect(),
            progress_save_interval: DEFAULT_PROGRESS_SAVE_INTERVAL,
            episodes_per_page: DEFAULT_EPISODES_PER_PAGE,
            description_max_length: DEFAULT_DESCRIPTION_MAX_LENGTH,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl PlayerConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Page size of zero falls back to the default
    pub fn with_episodes_per_page(mut self, per_page: usize) -> Self {
        self.episodes_per_page = if per_page == 0 {
            DEFAULT_EPISODES_PER_PAGE
        } else {
            per_page
        };
        self
    }

    pub fn with_feeds(mut self, feeds: Vec<String>) -> Self {
        self.feeds = feeds;
        self
    }
}

/// Platform data directory, or the working directory when there is none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("podplay"))
        .unwrap_or_else(|| PathBuf::from(".podplay"))
}
