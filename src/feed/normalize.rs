// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::FeedError;

use super::model::{Episode, Feed};

const UNKNOWN_FEED: &str = "Unknown Feed";
const UNTITLED: &str = "Untitled";

/// Parse RSS feed XML bytes into a normalized Feed
pub fn parse_feed(xml_bytes: &[u8], source_url: &str) -> Result<Feed, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;
    Ok(normalize_channel(&channel, source_url))
}

/// Convert a parsed RSS channel into canonical episode records.
///
/// Never fails: a malformed item degrades to defaults instead of dropping
/// the feed.
pub fn normalize_channel(channel: &rss::Channel, source_url: &str) -> Feed {
    let feed_title = Some(channel.title().trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_FEED)
        .to_string();

    let feed_image = channel
        .image()
        .map(|img| img.url().to_string())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .map(String::from)
        });

    let episodes = channel
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_item(item, index, &feed_title, source_url, &feed_image))
        .collect();

    Feed {
        title: feed_title,
        url: source_url.to_string(),
        description: strip_html(channel.description()),
        image_url: feed_image,
        episodes,
        load_error: None,
    }
}

fn normalize_item(
    item: &rss::Item,
    index: usize,
    feed_title: &str,
    source_url: &str,
    feed_image: &Option<String>,
) -> Episode {
    let content_key = item
        .guid()
        .map(|g| g.value())
        .or_else(|| item.link())
        .or_else(|| item.title())
        .unwrap_or_default();

    let itunes = item.itunes_ext();

    let published_at = item.pub_date().and_then(parse_pub_date).unwrap_or_else(|| {
        debug!(feed = feed_title, index, "Unparseable or missing pubDate, using now");
        Utc::now()
    });

    Episode {
        id: episode_id(feed_title, index, content_key),
        title: item
            .title()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string(),
        description: item
            .description()
            .or_else(|| item.content())
            .map(strip_html)
            .unwrap_or_default(),
        audio_url: item
            .enclosure()
            .map(|e| e.url().trim().to_string())
            .unwrap_or_default(),
        duration_seconds: itunes
            .and_then(|ext| ext.duration())
            .map(parse_duration)
            .unwrap_or(0),
        published_at,
        feed_title: feed_title.to_string(),
        feed_url: source_url.to_string(),
        image_url: itunes
            .and_then(|ext| ext.image())
            .map(String::from)
            .or_else(|| feed_image.clone()),
        is_played: false,
    }
}

/// Stable episode id: the same feed item yields the same id on every fetch
pub fn episode_id(feed_title: &str, index: usize, content_key: &str) -> String {
    format!("{feed_title}-{index}-{content_key}")
}

/// Parse `H:MM:SS`, `MM:SS`, or plain seconds. Malformed input yields 0.
pub fn parse_duration(raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return 0;
    }

    let mut total = 0.0_f64;
    for part in parts {
        match part.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => total = total * 60.0 + value,
            _ => return 0,
        }
    }

    total as u64
}

/// Parse a publish date in any of the formats seen in the wild
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned_formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    for format in zoned_formats {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Some feeds use named zones chrono cannot read; assume UTC
    let without_zone = raw
        .strip_suffix(" GMT")
        .or_else(|| raw.strip_suffix(" UTC"))
        .or_else(|| raw.strip_suffix(" UT"))
        .unwrap_or(raw);
    let naive_formats = [
        "%a, %d %b %Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in naive_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Drop markup and decode entities so descriptions render as plain text
pub fn strip_html(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;

    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = html_escape::decode_html_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
