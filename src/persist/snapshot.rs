// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::validate::{is_valid_progress, is_valid_time};

/// The minimal durable state needed to resume a session.
///
/// Feed content is never stored; feeds are always re-fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub current_episode_id: Option<String>,
    #[serde(default, alias = "currentTime")]
    pub current_time_seconds: f64,
    #[serde(default)]
    pub episode_progress: BTreeMap<String, f64>,
    #[serde(
        default,
        alias = "hiddenEpisodes",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub hidden_episode_ids: BTreeSet<String>,
    /// Whether the current episode was playing when the snapshot was taken
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_playing: bool,
}

impl Snapshot {
    /// Decode a stored snapshot, also accepting the older `{"state": {...}}`
    /// envelope
    pub fn from_json(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let mut value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|source| PersistenceError::Corrupt { source })?;

        if let Some(inner) = value.get_mut("state").filter(|v| v.is_object()) {
            value = inner.take();
        }

        let snapshot: Snapshot =
            serde_json::from_value(value).map_err(|source| PersistenceError::Corrupt { source })?;
        Ok(snapshot.sanitized())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_json::to_vec_pretty(self).map_err(PersistenceError::Serialize)
    }

    /// Drop values that could not have come from a sane numeric source
    pub fn sanitized(mut self) -> Self {
        if !is_valid_time(self.current_time_seconds) {
            self.current_time_seconds = 0.0;
        }
        self.current_episode_id = self
            .current_episode_id
            .filter(|id| !id.trim().is_empty());
        self.episode_progress
            .retain(|id, seconds| is_valid_progress(id, *seconds));
        self
    }
}
