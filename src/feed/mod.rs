// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod aggregate;
mod fetch;
mod model;
mod normalize;

pub use aggregate::{FeedAggregator, FeedFailure};
pub use fetch::{
    FeedSource, ProxyFeedSource, RssFeedSource, fetch_feed, fetch_feed_bytes, parse_proxy_feed,
};
pub use model::{Episode, Feed};
pub use normalize::{episode_id, normalize_channel, parse_duration, parse_feed, parse_pub_date, strip_html};
