// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::normalize::{parse_duration, parse_pub_date};

/// A single playable item from a feed, with a stable id.
///
/// Field names on the wire follow the feed-proxy JSON shape
/// (`audioUrl`, `duration`, `pubDate`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    #[serde(default, deserialize_with = "string_or_null")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    /// Empty when the item carried no enclosure
    #[serde(default, deserialize_with = "string_or_null")]
    pub audio_url: String,
    #[serde(rename = "duration", default, deserialize_with = "lenient_seconds")]
    pub duration_seconds: u64,
    #[serde(
        rename = "pubDate",
        default = "Utc::now",
        deserialize_with = "lenient_date"
    )]
    pub published_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub feed_title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub feed_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_played: bool,
}

/// An ordered collection of episodes from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub episodes: Vec<Episode>,
    /// Set on placeholder feeds produced for a failed fetch
    #[serde(skip)]
    pub load_error: Option<String>,
}

impl Feed {
    /// Empty stand-in for a feed that could not be loaded
    pub fn placeholder(url: &str, error: impl Into<String>) -> Self {
        Self {
            title: format!("Failed to load: {url}"),
            url: url.to_string(),
            description: "Failed to load this feed".to_string(),
            image_url: None,
            episodes: Vec::new(),
            load_error: Some(error.into()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.load_error.is_some()
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeconds {
    Whole(u64),
    Fractional(f64),
    Text(String),
}

/// Accepts integers, floats, strings like "1:02:03", or null
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Option::<RawSeconds>::deserialize(deserializer)? {
        Some(RawSeconds::Whole(secs)) => secs,
        Some(RawSeconds::Fractional(secs)) if secs.is_finite() && secs >= 0.0 => secs as u64,
        Some(RawSeconds::Fractional(_)) => 0,
        Some(RawSeconds::Text(text)) => parse_duration(&text),
        None => 0,
    };
    Ok(seconds)
}

fn lenient_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(parse_pub_date)
        .unwrap_or_else(Utc::now))
}
