// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wires feed aggregation, the session core, the episode list and autosave
//! into one command surface.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::PlayerConfig;
use crate::feed::{Feed, FeedAggregator, FeedFailure, FeedSource};
use crate::persist::PersistenceAdapter;
use crate::progress::SharedProgressReporter;
use crate::session::{AudioTransport, Autosave, LoadId, SessionCore, SharedSession, TransportEvent};
use crate::view::{EpisodeListView, EpisodeRow};

pub struct PlayerApp<S> {
    session: SharedSession,
    aggregator: FeedAggregator<S>,
    view: EpisodeListView,
    autosave: Autosave,
    config: PlayerConfig,
}

impl<S: FeedSource> PlayerApp<S> {
    pub fn new(
        source: S,
        reporter: SharedProgressReporter,
        transport: Box<dyn AudioTransport>,
        persistence: PersistenceAdapter,
        config: PlayerConfig,
    ) -> Self {
        let core = SessionCore::new(transport, persistence);
        Self {
            session: Arc::new(Mutex::new(core)),
            aggregator: FeedAggregator::new(source, reporter),
            view: EpisodeListView::new(config.episodes_per_page, config.description_max_length),
            autosave: Autosave::new(config.progress_save_interval),
            config,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Run `f` against the session, then bring autosave in line with the
    /// resulting phase
    async fn command<R>(&mut self, f: impl FnOnce(&mut SessionCore) -> R) -> R {
        let session = Arc::clone(&self.session);
        let mut core = session.lock().await;
        let result = f(&mut core);
        self.autosave.sync(&session, &core);
        result
    }

    /// First restore phase: saved scalars and progress, episode id held back
    pub async fn restore(&mut self) -> bool {
        self.command(|core| core.restore_snapshot()).await
    }

    /// Aggregate the configured feeds and hand them to the session, which
    /// completes any pending restore. Returns the number of episodes.
    pub async fn load_feeds(&mut self) -> usize {
        let urls = self.config.feeds.clone();
        let feeds = self.aggregator.load_all(&urls).await;
        self.install(feeds).await
    }

    /// Re-run aggregation over the same feed list
    pub async fn retry_feed_load(&mut self) -> usize {
        let feeds = self.aggregator.retry().await;
        self.install(feeds).await
    }

    async fn install(&mut self, feeds: Vec<Feed>) -> usize {
        let count = self
            .command(|core| {
                core.apply_feeds(feeds);
                core.catalog().len()
            })
            .await;
        info!(episodes = count, "Feeds installed");

        let core = self.session.lock().await;
        let page = self.view.page();
        self.view.set_page(page, &core);
        count
    }

    pub fn feed_failures(&self) -> &[FeedFailure] {
        self.aggregator.failures()
    }

    /// Banner text when any feed failed to load
    pub fn error_banner(&self) -> Option<String> {
        self.aggregator.error_banner()
    }

    pub async fn select_episode(&mut self, episode_id: &str) -> Option<LoadId> {
        self.command(|core| core.select_episode(episode_id)).await
    }

    pub async fn play(&mut self) -> bool {
        self.command(|core| core.resume()).await
    }

    /// Continue a restored episode that was playing when last saved
    pub async fn resume_restored(&mut self) -> bool {
        self.command(|core| core.resume_restored()).await
    }

    pub async fn pause(&mut self) -> bool {
        self.command(|core| core.pause()).await
    }

    pub async fn seek(&mut self, seconds: f64) -> bool {
        self.command(|core| core.seek(seconds)).await
    }

    pub async fn set_volume(&mut self, volume: f64) {
        self.command(|core| core.set_volume(volume)).await
    }

    pub async fn toggle_mute(&mut self) {
        self.command(|core| core.toggle_mute()).await
    }

    pub async fn hide_episode(&mut self, episode_id: &str) {
        self.command(|core| core.hide_episode(episode_id)).await
    }

    pub async fn show_episode(&mut self, episode_id: &str) {
        self.command(|core| core.show_episode(episode_id)).await
    }

    pub async fn next_episode(&mut self) -> Option<LoadId> {
        self.command(|core| core.skip_next()).await
    }

    pub async fn previous_episode(&mut self) -> Option<LoadId> {
        self.command(|core| core.skip_previous()).await
    }

    /// Reload the current episode after a playback error
    pub async fn retry_playback(&mut self) -> Option<LoadId> {
        self.command(|core| core.retry()).await
    }

    pub async fn reset(&mut self) {
        self.command(|core| core.reset()).await
    }

    /// Forward a callback from the audio subsystem
    pub async fn transport_event(&mut self, load: LoadId, event: TransportEvent) -> Option<LoadId> {
        self.command(|core| core.handle_transport_event(load, event)).await
    }

    // --- episode list ------------------------------------------------------

    pub fn view(&self) -> &EpisodeListView {
        &self.view
    }

    pub async fn rows(&self) -> Vec<EpisodeRow> {
        let core = self.session.lock().await;
        self.view.rows(&core)
    }

    pub async fn all_rows(&self) -> Vec<EpisodeRow> {
        let core = self.session.lock().await;
        self.view.all_rows(&core)
    }

    pub async fn total_pages(&self) -> usize {
        let core = self.session.lock().await;
        self.view.total_pages(&core)
    }

    pub async fn set_page(&mut self, page: usize) {
        let core = self.session.lock().await;
        self.view.set_page(page, &core);
    }

    pub async fn next_page(&mut self) {
        let core = self.session.lock().await;
        self.view.next_page(&core);
    }

    pub async fn previous_page(&mut self) {
        let core = self.session.lock().await;
        self.view.previous_page(&core);
    }

    pub async fn set_show_hidden(&mut self, show: bool) {
        self.view.set_show_hidden(show);
    }

    /// Stop the autosave timer and write any position not saved yet
    pub async fn shutdown(&mut self) {
        self.autosave.stop();
        self.session.lock().await.flush();
    }
}
