// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use tracing::debug;

use crate::error::PlaybackError;

/// Identifies one load of an audio source.
///
/// Callbacks tagged with anything but the current id belong to a load that
/// has since been replaced and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadId(pub(crate) u64);

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// Something the audio subsystem reports back about a load
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Metadata is known; the source can start playing
    MetadataLoaded { duration_seconds: f64 },
    /// Playback position moved
    TimeUpdate { seconds: f64 },
    /// Reached the end of the source
    Ended,
    /// Load, decode, or network failure
    Failed(PlaybackError),
}

/// The single audio output. Owned exclusively by the session core.
///
/// Calls never fail synchronously; problems come back as
/// [`TransportEvent::Failed`].
pub trait AudioTransport: Send {
    /// Replace the current source and start buffering at `start_at`
    fn load(&mut self, url: &str, start_at: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    /// Stop and drop the current source
    fn release(&mut self);
}

/// Transport with no audio device. Tracks what a real output would be doing.
#[derive(Debug, Default)]
pub struct HeadlessTransport {
    source: Option<String>,
    position: f64,
    playing: bool,
    volume: f64,
    muted: bool,
}

impl HeadlessTransport {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            ..Default::default()
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl AudioTransport for HeadlessTransport {
    fn load(&mut self, url: &str, start_at: f64) {
        debug!(url, start_at, "Loading source");
        self.source = Some(url.to_string());
        self.position = start_at;
        self.playing = false;
    }

    fn play(&mut self) {
        debug!(source = ?self.source, "Play");
        self.playing = self.source.is_some();
    }

    fn pause(&mut self) {
        debug!(source = ?self.source, "Pause");
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds;
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            debug!(source = %source, "Released source");
        }
        self.playing = false;
        self.position = 0.0;
    }
}
