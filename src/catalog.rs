// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeSet, HashMap};

use crate::feed::{Episode, Feed};
use crate::validate::is_playable;

#[derive(Debug, Clone, Copy)]
struct Slot {
    feed: usize,
    episode: usize,
}

/// One aggregation pass worth of feeds, with every episode merged into a
/// single newest-first sequence.
///
/// Replaced wholesale on each pass; episodes are looked up by id, never held
/// across passes.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    feeds: Vec<Feed>,
    order: Vec<Slot>,
    positions: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(feeds: Vec<Feed>) -> Self {
        let mut order: Vec<Slot> = feeds
            .iter()
            .enumerate()
            .flat_map(|(feed, f)| (0..f.episodes.len()).map(move |episode| Slot { feed, episode }))
            .collect();

        // Stable: episodes published at the same instant keep feed order
        order.sort_by(|a, b| {
            let a = &feeds[a.feed].episodes[a.episode];
            let b = &feeds[b.feed].episodes[b.episode];
            b.published_at.cmp(&a.published_at)
        });

        let mut positions = HashMap::with_capacity(order.len());
        for (pos, slot) in order.iter().enumerate() {
            let id = &feeds[slot.feed].episodes[slot.episode].id;
            positions.entry(id.clone()).or_insert(pos);
        }

        Self {
            feeds,
            order,
            positions,
        }
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of episodes across all feeds
    pub fn len(&self) -> usize {
        self.order.len()
    }

    fn at(&self, slot: Slot) -> &Episode {
        &self.feeds[slot.feed].episodes[slot.episode]
    }

    /// All episodes, newest first
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> + '_ {
        self.order.iter().map(|slot| self.at(*slot))
    }

    pub fn get(&self, id: &str) -> Option<&Episode> {
        self.positions.get(id).map(|pos| self.at(self.order[*pos]))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Flag an episode as played; returns false if the id is unknown
    pub fn mark_played(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.get(id) else {
            return false;
        };
        let slot = self.order[*pos];
        self.feeds[slot.feed].episodes[slot.episode].is_played = true;
        true
    }

    /// Next episode after `id` that can be played and is not hidden
    pub fn next_playable(&self, id: &str, hidden: &BTreeSet<String>) -> Option<&Episode> {
        let start = *self.positions.get(id)?;
        self.order[start + 1..]
            .iter()
            .map(|slot| self.at(*slot))
            .find(|episode| navigable(episode, hidden))
    }

    /// Closest newer episode before `id` that can be played and is not hidden
    pub fn previous_playable(&self, id: &str, hidden: &BTreeSet<String>) -> Option<&Episode> {
        let start = *self.positions.get(id)?;
        self.order[..start]
            .iter()
            .rev()
            .map(|slot| self.at(*slot))
            .find(|episode| navigable(episode, hidden))
    }

    /// The playable, visible sequence navigation walks over
    pub fn playable_sequence<'a>(
        &'a self,
        hidden: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a Episode> + 'a {
        self.episodes().filter(move |episode| navigable(episode, hidden))
    }
}

fn navigable(episode: &Episode, hidden: &BTreeSet<String>) -> bool {
    is_playable(episode) && !hidden.contains(&episode.id)
}
