// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Paged episode list derived from the session

use crate::feed::Episode;
use crate::session::SessionCore;
use crate::validate::is_playable;

/// One line of the episode list
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub id: String,
    pub title: String,
    pub feed_title: String,
    pub description: String,
    pub duration_seconds: u64,
    pub published: String,
    pub playable: bool,
    /// Only present when hidden episodes are shown; render dimmed
    pub hidden: bool,
    pub current: bool,
    pub playing: bool,
    pub played: bool,
    pub saved_progress: Option<f64>,
}

/// Paging and filtering state for the episode list. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct EpisodeListView {
    page: usize,
    per_page: usize,
    show_hidden: bool,
    description_max_length: usize,
}

impl EpisodeListView {
    pub fn new(per_page: usize, description_max_length: usize) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
            show_hidden: false,
            description_max_length,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn set_show_hidden(&mut self, show: bool) {
        self.show_hidden = show;
        self.page = 1;
    }

    fn visible<'a>(&self, core: &'a SessionCore) -> impl Iterator<Item = &'a Episode> + 'a {
        let show_hidden = self.show_hidden;
        core.catalog()
            .episodes()
            .filter(move |episode| show_hidden || !core.is_hidden(&episode.id))
    }

    /// Episodes in the list after filtering
    pub fn total(&self, core: &SessionCore) -> usize {
        self.visible(core).count()
    }

    /// At least one page, even when empty
    pub fn total_pages(&self, core: &SessionCore) -> usize {
        self.total(core).div_ceil(self.per_page).max(1)
    }

    /// Jump to `page`, clamped to the valid range
    pub fn set_page(&mut self, page: usize, core: &SessionCore) {
        self.page = page.clamp(1, self.total_pages(core));
    }

    pub fn next_page(&mut self, core: &SessionCore) {
        self.set_page(self.page + 1, core);
    }

    pub fn previous_page(&mut self, core: &SessionCore) {
        self.set_page(self.page.saturating_sub(1), core);
    }

    /// Rows for the current page
    pub fn rows(&self, core: &SessionCore) -> Vec<EpisodeRow> {
        let page = self.page.min(self.total_pages(core));
        self.visible(core)
            .skip((page - 1) * self.per_page)
            .take(self.per_page)
            .map(|episode| self.row(core, episode))
            .collect()
    }

    /// Every row, ignoring paging
    pub fn all_rows(&self, core: &SessionCore) -> Vec<EpisodeRow> {
        self.visible(core).map(|episode| self.row(core, episode)).collect()
    }

    fn row(&self, core: &SessionCore, episode: &Episode) -> EpisodeRow {
        let current = core.current_episode_id() == Some(episode.id.as_str());
        EpisodeRow {
            id: episode.id.clone(),
            title: episode.title.clone(),
            feed_title: episode.feed_title.clone(),
            description: truncate(&episode.description, self.description_max_length),
            duration_seconds: episode.duration_seconds,
            published: episode.published_at.format("%Y-%m-%d").to_string(),
            playable: is_playable(episode),
            hidden: core.is_hidden(&episode.id),
            current,
            playing: current && core.is_playing(),
            played: episode.is_played,
            saved_progress: core.progress_for(&episode.id).filter(|t| *t > 0.0),
        }
    }
}

/// Cut to `max_chars` characters and mark the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `h:mm:ss` or `m:ss`
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
