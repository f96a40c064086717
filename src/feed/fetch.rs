// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::model::{Episode, Feed};
use super::normalize::parse_feed;

/// Anything that can turn a feed URL into a normalized feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError>;
}

/// Fetch raw feed bytes from a URL, treating non-2xx as a failure
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let response = client
        .get(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
            body: response.text(),
        });
    }

    Ok(response.body)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient>(client: &C, url: &str) -> Result<Feed, FeedError> {
    Url::parse(url)?;
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes, url)
}

/// Reads RSS straight from the publisher
#[derive(Clone)]
pub struct RssFeedSource<C> {
    client: C,
}

impl<C: HttpClient> RssFeedSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for RssFeedSource<C> {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        fetch_feed(&self.client, url).await
    }
}

/// Asks a parse endpoint (`GET {endpoint}?url=<feed>`) for an already
/// normalized JSON feed
#[derive(Clone)]
pub struct ProxyFeedSource<C> {
    client: C,
    endpoint: Url,
}

impl<C: HttpClient> ProxyFeedSource<C> {
    pub fn new(client: C, endpoint: &str) -> Result<Self, FeedError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    fn request_url(&self, feed_url: &str) -> String {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("url", feed_url);
        url.into()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyFeed {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    episodes: Option<Vec<Episode>>,
}

#[async_trait]
impl<C: HttpClient> FeedSource for ProxyFeedSource<C> {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        let bytes = fetch_feed_bytes(&self.client, &self.request_url(url)).await?;
        parse_proxy_feed(&bytes, url)
    }
}

/// Decode the proxy's JSON body, checking the fields every feed must have
pub fn parse_proxy_feed(body: &[u8], url: &str) -> Result<Feed, FeedError> {
    let raw: ProxyFeed = serde_json::from_slice(body).map_err(|e| FeedError::InvalidJson {
        url: url.to_string(),
        source: e,
    })?;

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| FeedError::InvalidStructure {
            url: url.to_string(),
            reason: "missing title".to_string(),
        })?;

    let episodes = raw.episodes.ok_or_else(|| FeedError::InvalidStructure {
        url: url.to_string(),
        reason: "missing episodes array".to_string(),
    })?;

    Ok(Feed {
        title,
        url: raw.url.unwrap_or_else(|| url.to_string()),
        description: raw.description.unwrap_or_default(),
        image_url: raw.image_url,
        episodes,
        load_error: None,
    })
}
