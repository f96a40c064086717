// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, trace};

use super::core::{PlaybackPhase, SessionCore};

/// Session core shared between the command path and the autosave task
pub type SharedSession = Arc<Mutex<SessionCore>>;

/// Periodic progress saver.
///
/// Runs only while an episode is actively playing. Switching episodes
/// restarts the timer, so a tick never fires for an episode that is no
/// longer current.
pub struct Autosave {
    period: Duration,
    task: Option<(String, JoinHandle<()>)>,
}

impl Autosave {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start, restart, or stop the timer to match the session. Call after
    /// every command that can change the phase or the current episode.
    pub fn sync(&mut self, session: &SharedSession, core: &SessionCore) {
        let wanted = match (core.phase(), core.current_episode_id()) {
            (PlaybackPhase::ReadyPlaying, Some(id)) => Some(id),
            _ => None,
        };

        let unchanged = matches!(
            (wanted, &self.task),
            (Some(id), Some((running, _))) if running.as_str() == id
        );
        if unchanged {
            return;
        }

        self.stop();
        if let Some(id) = wanted {
            self.start(session, id.to_string());
        }
    }

    fn start(&mut self, session: &SharedSession, episode_id: String) {
        debug!(episode = %episode_id, period = ?self.period, "Starting autosave");
        let session = Arc::clone(session);
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let saved = session.lock().await.autosave_tick();
                trace!(saved, "Autosave tick");
            }
        });
        self.task = Some((episode_id, handle));
    }

    pub fn stop(&mut self) {
        if let Some((episode_id, handle)) = self.task.take() {
            debug!(episode = %episode_id, "Stopping autosave");
            handle.abort();
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{episode, feed};
    use crate::persist::PersistenceAdapter;
    use crate::session::transport::TransportEvent;
    use crate::session::transport::testing::RecordingTransport;

    fn shared() -> (SharedSession, PersistenceAdapter) {
        let persistence = PersistenceAdapter::in_memory("podcast-store");
        let mut core = SessionCore::new(Box::new(RecordingTransport::default()), persistence.clone());
        core.apply_feeds(vec![feed(
            "one",
            vec![episode("e2", 15, true), episode("e1", 10, true)],
        )]);
        (Arc::new(Mutex::new(core)), persistence)
    }

    async fn play(session: &SharedSession, id: &str, at: f64) {
        let mut core = session.lock().await;
        let load = core.select_episode(id).unwrap();
        core.handle_transport_event(
            load,
            TransportEvent::MetadataLoaded {
                duration_seconds: 1800.0,
            },
        );
        core.handle_transport_event(load, TransportEvent::TimeUpdate { seconds: at });
    }

    async fn sync(autosave: &mut Autosave, session: &SharedSession) {
        let core = session.lock().await;
        autosave.sync(session, &core);
    }

    fn saved(persistence: &PersistenceAdapter, id: &str) -> Option<f64> {
        persistence
            .load()
            .and_then(|s| s.episode_progress.get(id).copied())
    }

    #[tokio::test(start_paused = true)]
    async fn saves_progress_every_period_while_playing() {
        let (session, persistence) = shared();
        let mut autosave = Autosave::new(Duration::from_secs(5));
        play(&session, "e2", 0.0).await;
        sync(&mut autosave, &session).await;
        assert!(autosave.is_running());

        session.lock().await.update_current_time(7.0);
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(saved(&persistence, "e2"), Some(7.0));

        session.lock().await.update_current_time(11.0);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(saved(&persistence, "e2"), Some(11.0));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_run_while_paused() {
        let (session, persistence) = shared();
        let mut autosave = Autosave::new(Duration::from_secs(5));
        play(&session, "e2", 3.0).await;
        session.lock().await.pause();
        sync(&mut autosave, &session).await;

        assert!(!autosave.is_running());

        session.lock().await.update_current_time(40.0);
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(saved(&persistence, "e2"), Some(3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_when_episode_changes() {
        let (session, persistence) = shared();
        let mut autosave = Autosave::new(Duration::from_secs(5));
        play(&session, "e2", 1.0).await;
        sync(&mut autosave, &session).await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        play(&session, "e1", 0.0).await;
        sync(&mut autosave, &session).await;
        session.lock().await.update_current_time(2.0);

        // Old timer would have fired at 5s; new one fires at 8s
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(saved(&persistence, "e1"), None);

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(saved(&persistence, "e1"), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_timer() {
        let (session, persistence) = shared();
        let mut autosave = Autosave::new(Duration::from_secs(5));
        play(&session, "e2", 0.0).await;
        sync(&mut autosave, &session).await;

        autosave.stop();
        session.lock().await.update_current_time(9.0);
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(!autosave.is_running());
        assert_eq!(saved(&persistence, "e2"), None);
    }
}
