// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{InvalidInput, PlaybackError};
use crate::feed::{Episode, Feed};
use crate::persist::{PersistenceAdapter, Snapshot};
use crate::validate::{
    check_episode_id, check_playable, check_time, clamp_volume, is_valid_progress, is_valid_time,
    is_valid_volume,
};

use super::transport::{AudioTransport, LoadId, TransportEvent};

/// Where the active episode is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No episode loaded
    Idle,
    /// Episode selected, audio metadata not known yet
    Loading,
    ReadyPaused,
    ReadyPlaying,
    /// Reached the end; transient before auto-advance or idle
    Ended,
    /// Load or playback failed; transport disabled until retried or replaced
    Errored,
}

/// Lifecycle without the play/pause split. Paused and playing share the
/// Ready stage so `is_playing` stays the single source of truth for that
/// flag; [`PlaybackPhase`] is derived from both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Loading,
    Ready,
    Ended,
    Errored,
}

/// Saved episode id waiting for feeds to arrive
#[derive(Debug, Clone, PartialEq)]
struct PendingRestore {
    episode_id: String,
    time: f64,
    playing: bool,
}

/// Owns the playback session: which episode is current, transport state,
/// volume, and per-episode resume offsets.
///
/// Episodes are referenced by id only and resolved against the latest
/// [`Catalog`] on every access. Every meaningful mutation writes a snapshot
/// through the [`PersistenceAdapter`].
pub struct SessionCore {
    transport: Box<dyn AudioTransport>,
    persistence: PersistenceAdapter,
    catalog: Catalog,
    feeds_loaded: bool,

    current_episode_id: Option<String>,
    stage: Stage,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    is_muted: bool,
    last_error: Option<PlaybackError>,

    episode_progress: BTreeMap<String, f64>,
    hidden: BTreeSet<String>,
    played: BTreeSet<String>,
    pending_restore: Option<PendingRestore>,
    /// A restored episode was playing when the last session was saved
    resume_requested: bool,
    /// Durable state changed without being written yet
    dirty: bool,

    active_load: Option<LoadId>,
    loads_issued: u64,
}

impl SessionCore {
    pub fn new(transport: Box<dyn AudioTransport>, persistence: PersistenceAdapter) -> Self {
        Self {
            transport,
            persistence,
            catalog: Catalog::default(),
            feeds_loaded: false,
            current_episode_id: None,
            stage: Stage::Idle,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_muted: false,
            last_error: None,
            episode_progress: BTreeMap::new(),
            hidden: BTreeSet::new(),
            played: BTreeSet::new(),
            pending_restore: None,
            resume_requested: false,
            dirty: false,
            active_load: None,
            loads_issued: 0,
        }
    }

    // --- two-phase restore -------------------------------------------------

    /// Phase one: overlay scalar state from the saved snapshot and hold the
    /// saved episode id until feeds are available. Returns whether a snapshot
    /// was found.
    pub fn restore_snapshot(&mut self) -> bool {
        let Some(snapshot) = self.persistence.load() else {
            return false;
        };

        info!(
            episode = ?snapshot.current_episode_id,
            time = snapshot.current_time_seconds,
            entries = snapshot.episode_progress.len(),
            "Restoring saved session"
        );
        self.current_time = snapshot.current_time_seconds;
        self.episode_progress = snapshot.episode_progress;
        self.hidden = snapshot.hidden_episode_ids;
        self.pending_restore = snapshot.current_episode_id.map(|episode_id| PendingRestore {
            episode_id,
            time: snapshot.current_time_seconds,
            playing: snapshot.is_playing,
        });

        if self.feeds_loaded {
            self.reconcile();
        }
        true
    }

    /// Install a freshly aggregated feed set. Runs phase two of the restore
    /// and re-resolves the current episode by id.
    pub fn apply_feeds(&mut self, feeds: Vec<Feed>) {
        let mut catalog = Catalog::new(feeds);
        for id in &self.played {
            catalog.mark_played(id);
        }
        self.catalog = catalog;
        self.feeds_loaded = true;
        self.reconcile();
    }

    fn reconcile(&mut self) {
        if let Some(pending) = self.pending_restore.take() {
            let url = self
                .catalog
                .get(&pending.episode_id)
                .and_then(|episode| check_playable(episode).ok())
                .map(|episode| episode.audio_url.clone());

            match url {
                Some(url) => {
                    info!(episode = %pending.episode_id, time = pending.time, "Restored saved episode");
                    self.relinquish();
                    self.begin_load(&pending.episode_id, &url, pending.time, false);
                    self.resume_requested = pending.playing;
                }
                // The episode may live in a feed that failed this pass
                None if self.catalog.feeds().iter().any(Feed::is_placeholder) => {
                    info!(episode = %pending.episode_id, "Saved episode not found yet, some feeds failed");
                    self.pending_restore = Some(pending);
                }
                None => {
                    info!(episode = %pending.episode_id, "Saved episode no longer in feeds");
                    if self.current_episode_id.is_none() {
                        self.current_time = 0.0;
                    }
                }
            }
            return;
        }

        let stale = self
            .current_episode_id
            .as_deref()
            .is_some_and(|id| !self.catalog.contains(id));
        if stale {
            warn!(episode = ?self.current_episode_id, "Current episode vanished from feeds");
            self.relinquish();
            self.go_idle();
            self.persist();
        }
    }

    // --- commands ----------------------------------------------------------

    /// Make `episode_id` current and start playing it, resuming from saved
    /// progress if there is any. Invalid or unplayable episodes are logged
    /// and ignored.
    pub fn select_episode(&mut self, episode_id: &str) -> Option<LoadId> {
        let url = match self.resolve_playable(episode_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Ignoring episode selection");
                return None;
            }
        };

        self.relinquish();
        self.pending_restore = None;
        self.resume_requested = false;

        let resume_at = self
            .episode_progress
            .get(episode_id)
            .copied()
            .filter(|t| is_valid_time(*t))
            .unwrap_or(0.0);
        let load = self.begin_load(episode_id, &url, resume_at, true);

        self.played.insert(episode_id.to_string());
        self.catalog.mark_played(episode_id);
        self.persist();
        Some(load)
    }

    fn resolve_playable(&self, episode_id: &str) -> Result<String, InvalidInput> {
        check_episode_id(episode_id)?;
        let episode = self
            .catalog
            .get(episode_id)
            .ok_or_else(|| InvalidInput::UnknownEpisode(episode_id.to_string()))?;
        Ok(check_playable(episode)?.audio_url.clone())
    }

    /// Pause the playing episode and save its position
    pub fn pause(&mut self) -> bool {
        if self.phase() != PlaybackPhase::ReadyPlaying {
            debug!(phase = ?self.phase(), "Pause ignored");
            return false;
        }

        self.is_playing = false;
        self.transport.pause();
        self.save_current_progress();
        self.persist();
        true
    }

    /// Resume a paused episode. Refused while loading or errored.
    pub fn resume(&mut self) -> bool {
        if self.phase() != PlaybackPhase::ReadyPaused {
            debug!(phase = ?self.phase(), "Resume ignored");
            return false;
        }

        self.is_playing = true;
        self.resume_requested = false;
        self.transport.play();
        self.persist();
        true
    }

    /// Continue a restored episode that was playing when the previous
    /// session was saved. Only acts once the audio is ready.
    pub fn resume_restored(&mut self) -> bool {
        self.resume_requested && self.resume()
    }

    /// Set the playback position as reported by the audio source
    pub fn update_current_time(&mut self, seconds: f64) {
        match check_time(seconds) {
            Ok(seconds) => {
                self.current_time = seconds;
                self.dirty = true;
            }
            Err(e) => debug!(error = %e, "Ignoring time update"),
        }
    }

    /// Remember `seconds` as the resume point for `episode_id`
    pub fn record_progress(&mut self, episode_id: &str, seconds: f64) {
        if self.upsert_progress(episode_id, seconds) {
            self.persist();
        }
    }

    fn upsert_progress(&mut self, episode_id: &str, seconds: f64) -> bool {
        if !is_valid_progress(episode_id, seconds) {
            warn!(episode = episode_id, seconds, "Ignoring invalid progress");
            return false;
        }
        self.episode_progress.insert(episode_id.to_string(), seconds);
        true
    }

    fn save_current_progress(&mut self) {
        if let Some(id) = self.current_episode_id.clone() {
            self.upsert_progress(&id, self.current_time);
        }
    }

    /// Jump within the loaded episode
    pub fn seek(&mut self, seconds: f64) -> bool {
        if !matches!(self.stage, Stage::Loading | Stage::Ready) {
            debug!(phase = ?self.phase(), "Seek ignored");
            return false;
        }
        let seconds = match check_time(seconds) {
            Ok(seconds) if self.duration > 0.0 => seconds.min(self.duration),
            Ok(seconds) => seconds,
            Err(e) => {
                warn!(error = %e, "Ignoring seek");
                return false;
            }
        };

        self.transport.seek(seconds);
        self.current_time = seconds;
        self.save_current_progress();
        self.persist();
        true
    }

    /// Clamp into [0, 1] and apply. Never rejects.
    pub fn set_volume(&mut self, volume: f64) {
        let clamped = clamp_volume(volume);
        if !is_valid_volume(volume) {
            debug!(error = %InvalidInput::Volume(volume), applied = clamped, "Clamped volume");
        }
        self.volume = clamped;
        self.transport.set_volume(clamped);
    }

    /// Flip mute without touching the stored volume
    pub fn toggle_mute(&mut self) {
        self.is_muted = !self.is_muted;
        self.transport.set_muted(self.is_muted);
    }

    pub fn hide_episode(&mut self, episode_id: &str) {
        match check_episode_id(episode_id) {
            Ok(id) => {
                if self.hidden.insert(id.to_string()) {
                    self.persist();
                }
            }
            Err(e) => warn!(error = %e, "Ignoring hide"),
        }
    }

    pub fn show_episode(&mut self, episode_id: &str) {
        if self.hidden.remove(episode_id) {
            self.persist();
        }
    }

    /// Start the next playable, visible episode after the current one
    pub fn skip_next(&mut self) -> Option<LoadId> {
        let id = self.current_episode_id.as_deref()?;
        let next = self.catalog.next_playable(id, &self.hidden)?.id.clone();
        self.select_episode(&next)
    }

    /// Start the closest newer playable, visible episode
    pub fn skip_previous(&mut self) -> Option<LoadId> {
        let id = self.current_episode_id.as_deref()?;
        let previous = self.catalog.previous_playable(id, &self.hidden)?.id.clone();
        self.select_episode(&previous)
    }

    /// Reload the current episode after a failure, from where it stopped
    pub fn retry(&mut self) -> Option<LoadId> {
        if self.stage != Stage::Errored {
            debug!(phase = ?self.phase(), "Retry ignored");
            return None;
        }
        let id = self.current_episode_id.clone()?;
        let url = match self.resolve_playable(&id) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot retry");
                return None;
            }
        };

        self.relinquish();
        let resume_at = self.current_time;
        Some(self.begin_load(&id, &url, resume_at, true))
    }

    /// Forget the current episode, all saved progress and hidden episodes
    pub fn reset(&mut self) {
        self.relinquish();
        self.go_idle();
        self.pending_restore = None;
        self.episode_progress.clear();
        self.hidden.clear();
        self.persistence.clear();
        self.dirty = false;
    }

    // --- transport callbacks -----------------------------------------------

    /// Apply a callback from the audio subsystem. Callbacks for a load that
    /// has been replaced are dropped. Returns the next load if the episode
    /// ended and playback advanced.
    pub fn handle_transport_event(&mut self, load: LoadId, event: TransportEvent) -> Option<LoadId> {
        if self.active_load != Some(load) {
            debug!(%load, ?event, "Dropping event for superseded load");
            return None;
        }

        match event {
            TransportEvent::MetadataLoaded { duration_seconds } => {
                self.on_metadata_loaded(duration_seconds);
                None
            }
            TransportEvent::TimeUpdate { seconds } => {
                if self.stage == Stage::Ready {
                    self.update_current_time(seconds);
                }
                None
            }
            TransportEvent::Ended => self.on_ended(),
            TransportEvent::Failed(error) => {
                self.on_error(error);
                None
            }
        }
    }

    fn on_metadata_loaded(&mut self, duration_seconds: f64) {
        if self.stage != Stage::Loading {
            return;
        }
        if is_valid_time(duration_seconds) && duration_seconds > 0.0 {
            self.duration = duration_seconds;
        }
        self.stage = Stage::Ready;
        if self.is_playing {
            self.transport.play();
        }
    }

    /// Finished episodes start over next time; then advance or go idle
    fn on_ended(&mut self) -> Option<LoadId> {
        let id = self.current_episode_id.clone()?;
        self.stage = Stage::Ended;
        self.is_playing = false;
        self.upsert_progress(&id, 0.0);
        self.persist();

        let next = self
            .catalog
            .next_playable(&id, &self.hidden)
            .map(|episode| episode.id.clone());
        match next {
            Some(next) => {
                info!(from = %id, to = %next, "Advancing to next episode");
                self.select_episode(&next)
            }
            None => {
                info!(episode = %id, "Reached the end of the episode list");
                self.relinquish();
                self.go_idle();
                self.persist();
                None
            }
        }
    }

    fn on_error(&mut self, error: PlaybackError) {
        if error.is_abort() {
            debug!(%error, "Load aborted");
            return;
        }

        warn!(%error, "Playback failed");
        if self.current_time > 0.0 {
            self.save_current_progress();
        }
        self.transport.pause();
        self.stage = Stage::Errored;
        self.is_playing = false;
        self.last_error = Some(error);
        self.persist();
    }

    /// Periodic save while playing. Keys progress by whichever episode is
    /// current when the tick fires.
    pub fn autosave_tick(&mut self) -> bool {
        if self.phase() != PlaybackPhase::ReadyPlaying || self.current_time <= 0.0 {
            return false;
        }
        self.save_current_progress();
        self.persist();
        true
    }

    // --- internals ---------------------------------------------------------

    fn begin_load(&mut self, episode_id: &str, url: &str, start_at: f64, autoplay: bool) -> LoadId {
        self.loads_issued += 1;
        let load = LoadId(self.loads_issued);

        self.active_load = Some(load);
        self.current_episode_id = Some(episode_id.to_string());
        self.current_time = start_at;
        self.duration = self
            .catalog
            .get(episode_id)
            .map(|episode| episode.duration_seconds as f64)
            .unwrap_or(0.0);
        self.stage = Stage::Loading;
        self.is_playing = autoplay;
        self.last_error = None;

        self.transport.set_volume(self.volume);
        self.transport.set_muted(self.is_muted);
        self.transport.load(url, start_at);
        debug!(%load, episode = episode_id, start_at, autoplay, "Loading episode");
        load
    }

    /// Save the outgoing episode's position and free the output so two
    /// sources never overlap
    fn relinquish(&mut self) {
        if self.current_episode_id.is_none() {
            return;
        }
        if matches!(self.stage, Stage::Loading | Stage::Ready) && self.current_time > 0.0 {
            self.save_current_progress();
        }
        self.transport.pause();
        self.transport.release();
        self.active_load = None;
    }

    fn go_idle(&mut self) {
        self.current_episode_id = None;
        self.resume_requested = false;
        self.stage = Stage::Idle;
        self.is_playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.last_error = None;
        self.active_load = None;
    }

    /// Write the current snapshot through the persistence adapter
    pub fn persist(&mut self) {
        self.persistence.save(&self.snapshot());
        self.dirty = false;
    }

    /// Persist only if something changed since the last write. Returns
    /// whether a snapshot was written.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.persist();
        true
    }

    // --- queries -----------------------------------------------------------

    pub fn phase(&self) -> PlaybackPhase {
        match self.stage {
            Stage::Idle => PlaybackPhase::Idle,
            Stage::Loading => PlaybackPhase::Loading,
            Stage::Ready if self.is_playing => PlaybackPhase::ReadyPlaying,
            Stage::Ready => PlaybackPhase::ReadyPaused,
            Stage::Ended => PlaybackPhase::Ended,
            Stage::Errored => PlaybackPhase::Errored,
        }
    }

    /// The durable subset of the session. A restore still waiting for its
    /// feed is reported as current so it is not lost on the next write.
    pub fn snapshot(&self) -> Snapshot {
        let pending = self.pending_restore.as_ref();
        let (current_episode_id, is_playing) = match (&self.current_episode_id, pending) {
            (Some(id), _) => (Some(id.clone()), self.is_playing),
            (None, Some(pending)) => (Some(pending.episode_id.clone()), pending.playing),
            (None, None) => (None, false),
        };
        Snapshot {
            current_episode_id,
            current_time_seconds: self.current_time,
            episode_progress: self.episode_progress.clone(),
            hidden_episode_ids: self.hidden.clone(),
            is_playing,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn feeds_loaded(&self) -> bool {
        self.feeds_loaded
    }

    pub fn current_episode_id(&self) -> Option<&str> {
        self.current_episode_id.as_deref()
    }

    /// The live episode object for the current id, from the latest feeds
    pub fn current_episode(&self) -> Option<&Episode> {
        self.catalog.get(self.current_episode_id.as_deref()?)
    }

    /// Saved id still waiting for feeds, if phase two has not run
    pub fn pending_restore_id(&self) -> Option<&str> {
        self.pending_restore.as_ref().map(|p| p.episode_id.as_str())
    }

    pub fn active_load(&self) -> Option<LoadId> {
        self.active_load
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.last_error.as_ref()
    }

    pub fn episode_progress(&self) -> &BTreeMap<String, f64> {
        &self.episode_progress
    }

    pub fn progress_for(&self, episode_id: &str) -> Option<f64> {
        self.episode_progress.get(episode_id).copied()
    }

    pub fn hidden_episode_ids(&self) -> &BTreeSet<String> {
        &self.hidden
    }

    pub fn is_hidden(&self, episode_id: &str) -> bool {
        self.hidden.contains(episode_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{episode, feed};
    use crate::session::transport::testing::RecordingTransport;

    struct Harness {
        core: SessionCore,
        transport: RecordingTransport,
        persistence: PersistenceAdapter,
    }

    fn harness() -> Harness {
        harness_with(PersistenceAdapter::in_memory("podcast-store"))
    }

    fn harness_with(persistence: PersistenceAdapter) -> Harness {
        let transport = RecordingTransport::default();
        let core = SessionCore::new(Box::new(transport.clone()), persistence.clone());
        Harness {
            core,
            transport,
            persistence,
        }
    }

    /// e3 newest, then e2, e1 (no audio), e0 oldest
    fn feeds() -> Vec<Feed> {
        vec![
            feed(
                "one",
                vec![episode("e3", 20, true), episode("e1", 10, false)],
            ),
            feed("two", vec![episode("e2", 15, true), episode("e0", 5, true)]),
        ]
    }

    fn loaded() -> Harness {
        let mut h = harness();
        h.core.apply_feeds(feeds());
        h
    }

    fn playing(h: &mut Harness, id: &str) -> LoadId {
        let load = h.core.select_episode(id).unwrap();
        h.core.handle_transport_event(
            load,
            TransportEvent::MetadataLoaded {
                duration_seconds: 1800.0,
            },
        );
        load
    }

    fn saved_snapshot(id: &str, time: f64) -> PersistenceAdapter {
        let persistence = PersistenceAdapter::in_memory("podcast-store");
        persistence.save(&Snapshot {
            current_episode_id: Some(id.to_string()),
            current_time_seconds: time,
            episode_progress: BTreeMap::from([(id.to_string(), time)]),
            ..Default::default()
        });
        persistence
    }

    #[test]
    fn starts_idle_with_defaults() {
        let h = harness();

        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert_eq!(h.core.volume(), 1.0);
        assert!(!h.core.is_muted());
        assert!(h.core.current_episode().is_none());
    }

    #[test]
    fn select_starts_loading_and_marks_played() {
        let mut h = loaded();

        let load = h.core.select_episode("e2");

        assert!(load.is_some());
        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
        assert!(h.core.is_playing());
        assert_eq!(h.core.current_time(), 0.0);
        assert_eq!(h.core.duration(), 1800.0);
        assert!(h.core.current_episode().unwrap().is_played);
        assert_eq!(
            h.transport.log().active_source.as_deref(),
            Some("https://example.com/e2.mp3")
        );
        assert_eq!(
            h.persistence.load().unwrap().current_episode_id.as_deref(),
            Some("e2")
        );
    }

    #[test]
    fn select_resumes_from_saved_progress() {
        let mut h = loaded();
        h.core.record_progress("e2", 300.0);

        h.core.select_episode("e2");

        assert_eq!(h.core.current_time(), 300.0);
        assert!(h.transport.log().calls.contains(&"load https://example.com/e2.mp3 @300".to_string()));
    }

    #[test]
    fn select_rejects_unplayable_and_unknown_episodes() {
        let mut h = loaded();

        assert!(h.core.select_episode("e1").is_none());
        assert!(h.core.select_episode("missing").is_none());
        assert!(h.core.select_episode("  ").is_none());

        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert!(h.transport.log().calls.is_empty());
        assert_eq!(h.persistence.load(), None);
    }

    #[test]
    fn metadata_moves_loading_to_ready_and_autoplays() {
        let mut h = loaded();

        playing(&mut h, "e3");

        assert_eq!(h.core.phase(), PlaybackPhase::ReadyPlaying);
        assert!(h.transport.log().playing);
    }

    #[test]
    fn pause_saves_progress_and_resume_restarts() {
        let mut h = loaded();
        let load = playing(&mut h, "e3");
        h.core
            .handle_transport_event(load, TransportEvent::TimeUpdate { seconds: 42.0 });

        assert!(h.core.pause());
        assert_eq!(h.core.phase(), PlaybackPhase::ReadyPaused);
        assert_eq!(h.core.progress_for("e3"), Some(42.0));
        assert_eq!(h.persistence.load().unwrap().episode_progress.get("e3"), Some(&42.0));

        assert!(h.core.resume());
        assert_eq!(h.core.phase(), PlaybackPhase::ReadyPlaying);
    }

    #[test]
    fn resume_refused_before_metadata() {
        let mut h = loaded();
        h.core.select_episode("e3");
        h.core.is_playing = false;

        assert!(!h.core.resume());
        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
    }

    #[test]
    fn pause_only_valid_while_playing() {
        let mut h = loaded();

        assert!(!h.core.pause());
        h.core.select_episode("e3");
        assert!(!h.core.pause());
    }

    #[test]
    fn update_current_time_rejects_invalid_values() {
        let mut h = loaded();
        h.core.update_current_time(12.5);

        h.core.update_current_time(-1.0);
        h.core.update_current_time(f64::NAN);
        h.core.update_current_time(f64::INFINITY);

        assert_eq!(h.core.current_time(), 12.5);
    }

    #[test]
    fn record_progress_is_idempotent_and_validated() {
        let mut h = loaded();

        h.core.record_progress("e2", 60.0);
        h.core.record_progress("e2", 60.0);
        assert_eq!(h.core.progress_for("e2"), Some(60.0));
        assert_eq!(h.core.episode_progress().len(), 1);

        h.core.record_progress("e2", -3.0);
        h.core.record_progress("e2", f64::NAN);
        h.core.record_progress("", 5.0);
        assert_eq!(h.core.progress_for("e2"), Some(60.0));
        assert_eq!(h.core.episode_progress().len(), 1);
    }

    #[test]
    fn set_volume_always_clamps() {
        let mut h = harness();

        h.core.set_volume(1.5);
        assert_eq!(h.core.volume(), 1.0);
        h.core.set_volume(-0.2);
        assert_eq!(h.core.volume(), 0.0);
        h.core.set_volume(0.35);
        assert_eq!(h.core.volume(), 0.35);
        assert_eq!(h.transport.log().volume, Some(0.35));
    }

    #[test]
    fn mute_preserves_volume() {
        let mut h = harness();
        h.core.set_volume(0.6);

        h.core.toggle_mute();
        assert!(h.core.is_muted());
        assert_eq!(h.core.volume(), 0.6);
        assert!(h.transport.log().muted);

        h.core.toggle_mute();
        assert!(!h.core.is_muted());
        assert_eq!(h.core.volume(), 0.6);
    }

    #[test]
    fn seek_clamps_to_duration_and_records_progress() {
        let mut h = loaded();
        playing(&mut h, "e3");

        assert!(h.core.seek(90.0));
        assert_eq!(h.core.current_time(), 90.0);
        assert_eq!(h.core.progress_for("e3"), Some(90.0));

        assert!(h.core.seek(99_999.0));
        assert_eq!(h.core.current_time(), 1800.0);

        assert!(!h.core.seek(f64::NAN));
        assert_eq!(h.core.current_time(), 1800.0);
    }

    #[test]
    fn seek_ignored_when_idle() {
        let mut h = loaded();

        assert!(!h.core.seek(10.0));
        assert!(h.core.episode_progress().is_empty());
    }

    #[test]
    fn switching_episodes_never_overlaps_sources() {
        let mut h = loaded();
        let first = playing(&mut h, "e3");
        h.core
            .handle_transport_event(first, TransportEvent::TimeUpdate { seconds: 75.0 });

        h.core.select_episode("e2");

        let log = h.transport.log();
        assert_eq!(log.overlaps, 0);
        assert_eq!(log.active_source.as_deref(), Some("https://example.com/e2.mp3"));
        drop(log);
        // Outgoing episode's position was kept
        assert_eq!(h.core.progress_for("e3"), Some(75.0));
    }

    #[test]
    fn events_from_superseded_load_are_ignored() {
        let mut h = loaded();
        let stale = h.core.select_episode("e3").unwrap();
        let fresh = h.core.select_episode("e2").unwrap();

        h.core.handle_transport_event(
            stale,
            TransportEvent::Failed(PlaybackError::Network {
                episode_id: "e3".to_string(),
                message: "reset".to_string(),
            }),
        );
        h.core.handle_transport_event(stale, TransportEvent::TimeUpdate { seconds: 999.0 });

        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
        assert!(h.core.last_error().is_none());
        assert_eq!(h.core.active_load(), Some(fresh));
        assert_eq!(h.core.current_time(), 0.0);
    }

    #[test]
    fn aborted_load_is_not_an_error() {
        let mut h = loaded();
        let load = h.core.select_episode("e3").unwrap();

        h.core.handle_transport_event(
            load,
            TransportEvent::Failed(PlaybackError::Aborted {
                episode_id: "e3".to_string(),
            }),
        );

        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
        assert!(h.core.last_error().is_none());
    }

    #[test]
    fn playback_error_disables_transport_until_retry() {
        let mut h = loaded();
        let load = playing(&mut h, "e3");
        h.core
            .handle_transport_event(load, TransportEvent::TimeUpdate { seconds: 30.0 });

        h.core.handle_transport_event(
            load,
            TransportEvent::Failed(PlaybackError::Decode {
                episode_id: "e3".to_string(),
                message: "bad frame".to_string(),
            }),
        );

        assert_eq!(h.core.phase(), PlaybackPhase::Errored);
        assert_eq!(h.core.current_episode_id(), Some("e3"));
        assert!(h.core.last_error().is_some());
        assert!(!h.core.resume());
        assert!(!h.core.pause());
        assert_eq!(h.core.progress_for("e3"), Some(30.0));

        let retried = h.core.retry();
        assert!(retried.is_some());
        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
        assert_eq!(h.core.current_time(), 30.0);
        assert!(h.core.last_error().is_none());
    }

    #[test]
    fn ended_resets_progress_and_advances_past_unplayable() {
        let mut h = loaded();
        let load = playing(&mut h, "e2");
        h.core
            .handle_transport_event(load, TransportEvent::TimeUpdate { seconds: 1799.0 });

        let next = h.core.handle_transport_event(load, TransportEvent::Ended);

        assert!(next.is_some());
        assert_eq!(h.core.progress_for("e2"), Some(0.0));
        // e1 has no audio, so e0 follows e2
        assert_eq!(h.core.current_episode_id(), Some("e0"));
        assert_eq!(h.core.phase(), PlaybackPhase::Loading);
        assert_eq!(h.transport.log().overlaps, 0);
    }

    #[test]
    fn ended_on_last_episode_goes_idle() {
        let mut h = loaded();
        let load = playing(&mut h, "e0");

        let next = h.core.handle_transport_event(load, TransportEvent::Ended);

        assert!(next.is_none());
        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert_eq!(h.core.current_episode_id(), None);
        assert_eq!(h.core.progress_for("e0"), Some(0.0));
        assert!(h.transport.log().active_source.is_none());
    }

    #[test]
    fn ended_skips_hidden_episodes() {
        let mut h = loaded();
        h.core.hide_episode("e2");
        let load = playing(&mut h, "e3");

        h.core.handle_transport_event(load, TransportEvent::Ended);

        assert_eq!(h.core.current_episode_id(), Some("e0"));
    }

    #[test]
    fn skip_next_and_previous_walk_playable_order() {
        let mut h = loaded();
        h.core.select_episode("e3");

        h.core.skip_next();
        assert_eq!(h.core.current_episode_id(), Some("e2"));
        h.core.skip_next();
        assert_eq!(h.core.current_episode_id(), Some("e0"));
        assert!(h.core.skip_next().is_none());
        h.core.skip_previous();
        assert_eq!(h.core.current_episode_id(), Some("e2"));
    }

    #[test]
    fn hide_and_show_are_persisted() {
        let mut h = loaded();

        h.core.hide_episode("e2");
        assert!(h.core.is_hidden("e2"));
        assert!(h.persistence.load().unwrap().hidden_episode_ids.contains("e2"));

        h.core.show_episode("e2");
        assert!(!h.core.is_hidden("e2"));
        assert!(h.persistence.load().unwrap().hidden_episode_ids.is_empty());
    }

    #[test]
    fn restore_round_trip_keeps_saved_time() {
        let mut h = harness_with(saved_snapshot("e2", 120.0));

        assert!(h.core.restore_snapshot());
        assert_eq!(h.core.pending_restore_id(), Some("e2"));
        assert_eq!(h.core.current_episode_id(), None);
        assert_eq!(h.core.progress_for("e2"), Some(120.0));

        h.core.apply_feeds(feeds());

        assert_eq!(h.core.current_episode_id(), Some("e2"));
        assert_eq!(h.core.current_time(), 120.0);
        assert_eq!(h.core.pending_restore_id(), None);
        assert!(!h.core.is_playing());
        assert!(h.transport.log().calls.contains(&"load https://example.com/e2.mp3 @120".to_string()));
    }

    #[test]
    fn restored_episode_waits_paused_after_metadata() {
        let mut h = harness_with(saved_snapshot("e2", 120.0));
        h.core.restore_snapshot();
        h.core.apply_feeds(feeds());
        let load = h.core.active_load().unwrap();

        h.core.handle_transport_event(
            load,
            TransportEvent::MetadataLoaded {
                duration_seconds: 1800.0,
            },
        );

        assert_eq!(h.core.phase(), PlaybackPhase::ReadyPaused);
        assert_eq!(h.core.current_time(), 120.0);
        assert!(!h.transport.log().playing);
    }

    #[test]
    fn restore_miss_settles_idle_without_error() {
        let mut h = harness_with(saved_snapshot("gone", 120.0));
        h.core.restore_snapshot();

        h.core.apply_feeds(feeds());

        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert_eq!(h.core.current_episode_id(), None);
        assert_eq!(h.core.pending_restore_id(), None);
        assert!(h.core.last_error().is_none());
        assert!(h.transport.log().calls.is_empty());
        // Progress for the vanished episode is kept in case it comes back
        assert_eq!(h.core.progress_for("gone"), Some(120.0));
    }

    #[test]
    fn restore_waits_while_a_feed_is_unavailable() {
        let mut h = harness_with(saved_snapshot("e2", 120.0));
        h.core.restore_snapshot();

        h.core.apply_feeds(vec![
            feed("one", vec![episode("e3", 20, true)]),
            Feed::placeholder("https://example.com/two.xml", "HTTP 503"),
        ]);

        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert_eq!(h.core.pending_restore_id(), Some("e2"));
        assert!(h.transport.log().calls.is_empty());

        // Unrelated writes keep the saved episode
        h.core.hide_episode("e3");
        let saved = h.persistence.load().unwrap();
        assert_eq!(saved.current_episode_id.as_deref(), Some("e2"));
        assert_eq!(saved.current_time_seconds, 120.0);

        h.core.apply_feeds(feeds());
        assert_eq!(h.core.current_episode_id(), Some("e2"));
        assert_eq!(h.core.current_time(), 120.0);
    }

    #[test]
    fn resume_restored_only_for_a_session_saved_while_playing() {
        let persistence = saved_snapshot("e2", 120.0);
        let mut h = harness_with(persistence.clone());
        h.core.restore_snapshot();
        h.core.apply_feeds(feeds());
        assert!(!h.core.resume_restored());

        let mut snapshot = persistence.load().unwrap();
        snapshot.is_playing = true;
        persistence.save(&snapshot);
        let mut h = harness_with(persistence);
        h.core.restore_snapshot();
        h.core.apply_feeds(feeds());
        let load = h.core.active_load().unwrap();
        assert!(!h.core.resume_restored());

        h.core.handle_transport_event(
            load,
            TransportEvent::MetadataLoaded {
                duration_seconds: 1800.0,
            },
        );
        assert!(h.core.resume_restored());
        assert_eq!(h.core.phase(), PlaybackPhase::ReadyPlaying);
        assert!(h.persistence.load().unwrap().is_playing);
        assert!(!h.core.resume_restored());
    }

    #[test]
    fn flush_writes_only_unsaved_positions() {
        let mut h = loaded();
        let load = playing(&mut h, "e3");
        h.persistence.clear();

        assert!(!h.core.flush());
        assert_eq!(h.persistence.load(), None);

        h.core
            .handle_transport_event(load, TransportEvent::TimeUpdate { seconds: 64.0 });
        assert!(h.core.flush());
        assert_eq!(h.persistence.load().unwrap().current_time_seconds, 64.0);
        assert!(!h.core.flush());
    }

    #[test]
    fn restore_after_feeds_reconciles_immediately() {
        let mut h = harness_with(saved_snapshot("e3", 10.0));
        h.core.apply_feeds(feeds());

        h.core.restore_snapshot();

        assert_eq!(h.core.current_episode_id(), Some("e3"));
        assert_eq!(h.core.current_time(), 10.0);
    }

    #[test]
    fn restore_without_snapshot_is_a_noop() {
        let mut h = harness();

        assert!(!h.core.restore_snapshot());
        h.core.apply_feeds(feeds());
        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn refetch_reresolves_current_episode() {
        let mut h = loaded();
        h.core.select_episode("e3");

        h.core.apply_feeds(feeds());
        assert_eq!(h.core.current_episode_id(), Some("e3"));
        assert!(h.core.current_episode().unwrap().is_played);

        h.core.apply_feeds(vec![feed("two", vec![episode("e2", 15, true)])]);
        assert_eq!(h.core.current_episode_id(), None);
        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert!(h.transport.log().active_source.is_none());
    }

    #[test]
    fn autosave_tick_only_while_playing() {
        let mut h = loaded();
        assert!(!h.core.autosave_tick());

        let load = playing(&mut h, "e3");
        h.core
            .handle_transport_event(load, TransportEvent::TimeUpdate { seconds: 15.0 });
        assert!(h.core.autosave_tick());
        assert_eq!(h.persistence.load().unwrap().episode_progress.get("e3"), Some(&15.0));

        h.core.pause();
        h.core.update_current_time(20.0);
        assert!(!h.core.autosave_tick());
        assert_eq!(h.core.progress_for("e3"), Some(15.0));
    }

    #[test]
    fn reset_clears_session_and_storage() {
        let mut h = loaded();
        playing(&mut h, "e3");
        h.core.record_progress("e3", 50.0);
        h.core.hide_episode("e2");

        h.core.reset();

        assert_eq!(h.core.phase(), PlaybackPhase::Idle);
        assert!(h.core.episode_progress().is_empty());
        assert!(h.core.hidden_episode_ids().is_empty());
        assert_eq!(h.persistence.load(), None);

        h.core.hide_episode("e0");
        let saved = h.persistence.load().unwrap();
        assert_eq!(saved.hidden_episode_ids.len(), 1);
        assert!(saved.episode_progress.is_empty());
    }
}
