// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure predicates that gate every session mutation and navigation step.

use crate::error::InvalidInput;
use crate::feed::Episode;

/// An episode can be played only with an id, a title, and a non-blank audio URL
pub fn is_playable(episode: &Episode) -> bool {
    !episode.id.is_empty() && !episode.title.is_empty() && !episode.audio_url.trim().is_empty()
}

/// Finite and non-negative
pub fn is_valid_time(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

/// Finite and within [0, 1]
pub fn is_valid_volume(volume: f64) -> bool {
    volume.is_finite() && (0.0..=1.0).contains(&volume)
}

pub fn is_valid_episode_id(id: &str) -> bool {
    !id.trim().is_empty()
}

pub fn is_valid_progress(id: &str, seconds: f64) -> bool {
    is_valid_episode_id(id) && is_valid_time(seconds)
}

pub fn check_time(seconds: f64) -> Result<f64, InvalidInput> {
    if is_valid_time(seconds) {
        Ok(seconds)
    } else {
        Err(InvalidInput::Time(seconds))
    }
}

pub fn check_episode_id(id: &str) -> Result<&str, InvalidInput> {
    if is_valid_episode_id(id) {
        Ok(id)
    } else {
        Err(InvalidInput::EpisodeId(id.to_string()))
    }
}

pub fn check_playable(episode: &Episode) -> Result<&Episode, InvalidInput> {
    if is_playable(episode) {
        Ok(episode)
    } else {
        Err(InvalidInput::Unplayable(episode.id.clone()))
    }
}

/// Clamp into [0, 1]; non-finite input maps to silence rather than full volume
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
