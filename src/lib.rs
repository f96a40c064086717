// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod persist;
pub mod progress;
pub mod session;
pub mod validate;
pub mod view;

// Re-export main types for convenience
pub use app::PlayerApp;
pub use catalog::Catalog;
pub use config::{FeedConfig, PODCAST_FEEDS, PlayerConfig};
pub use error::{FeedError, InvalidInput, PersistenceError, PlaybackError};
pub use feed::{Episode, Feed, FeedAggregator, FeedSource, ProxyFeedSource, RssFeedSource};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use persist::{FileStore, KeyValueStore, MemoryStore, PersistenceAdapter, Snapshot};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use session::{
    AudioTransport, Autosave, HeadlessTransport, LoadId, PlaybackPhase, SessionCore, SharedSession,
    TransportEvent,
};
pub use view::{EpisodeListView, EpisodeRow};
