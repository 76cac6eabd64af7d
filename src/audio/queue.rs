use std::collections::VecDeque;
use tracing::{debug, info};

use crate::audio::track::TrackDescriptor;

/// Pending tracks for one guild, in play order.
///
/// Only the guild's player task touches it, so no locking is needed here.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<TrackDescriptor>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the 1-based position of the new entry.
    pub fn enqueue(&mut self, track: TrackDescriptor) -> usize {
        info!("➕ Added to queue: {}", track.title());
        self.items.push_back(track);
        self.items.len()
    }

    /// Puts a track back at the head, ahead of everything already waiting.
    pub fn enqueue_front(&mut self, track: TrackDescriptor) {
        debug!("⏮️ Re-queued at head: {}", track.title());
        self.items.push_front(track);
    }

    /// Strict FIFO.
    pub fn dequeue_next(&mut self) -> Option<TrackDescriptor> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => info!("➡️ Next in queue: {}", track.title()),
            None => debug!("📭 Queue empty"),
        }
        next
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            info!("🗑️ Cleared {} queued tracks", self.items.len());
        }
        self.items.clear();
    }

    pub fn peek_all(&self) -> impl Iterator<Item = &TrackDescriptor> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
