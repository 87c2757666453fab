use crate::speaker::SpeakerMode;
use crate::transcript::TranscriptBuffer;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchState {
    #[default]
    Searching,
    Locked,
}

/// Where the reading line should be, in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTarget {
    pub offset: f32,
    pub element: usize,
    pub progress: f32,
    pub confidence: f32,
}

/// Alignment state for one session.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub(in crate::sync) match_state: MatchState,
    pub(in crate::sync) current_element: Option<usize>,
    pub(in crate::sync) word_pointer: usize,
    pub(in crate::sync) progress: f32,
    pub(in crate::sync) consecutive_misses: u32,
    pub(in crate::sync) no_match_near_end_count: u32,
    pub(in crate::sync) words: TranscriptBuffer,
    /// Index epoch `current_element` refers to.
    pub(in crate::sync) epoch: u64,
    pub(in crate::sync) paused: bool,
    pub(in crate::sync) target: Option<ScrollTarget>,
}

impl SyncState {
    pub(in crate::sync) fn reset(&mut self, epoch: u64) {
        *self = SyncState {
            epoch,
            ..SyncState::default()
        };
    }

    /// Move to another element, clearing per-element tracking.
    pub(in crate::sync) fn enter_element(&mut self, element: usize) {
        self.current_element = Some(element);
        self.word_pointer = 0;
        self.progress = 0.0;
        self.words.reset_confirmed();
    }

    pub fn match_state(&self) -> MatchState {
        self.match_state
    }

    pub fn current_element(&self) -> Option<usize> {
        self.current_element
    }

    pub fn word_pointer(&self) -> usize {
        self.word_pointer
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn near_end_misses(&self) -> u32 {
        self.no_match_near_end_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn target(&self) -> Option<ScrollTarget> {
        self.target
    }

    pub fn pending_words(&self) -> &[String] {
        self.words.pending()
    }

    pub fn confirmed_words(&self) -> &[String] {
        self.words.confirmed()
    }
}

/// Interim words waiting out the debounce window.
#[derive(Debug, Clone)]
pub(in crate::sync) struct PendingInterim {
    pub(in crate::sync) request_id: u64,
    pub(in crate::sync) words: Vec<String>,
    pub(in crate::sync) due: Instant,
}

/// A content hash seen by the poller that differs from the indexed one.
#[derive(Debug, Clone)]
pub(in crate::sync) struct PendingDocumentChange {
    pub(in crate::sync) hash: String,
    pub(in crate::sync) since: Instant,
}

/// Read-only view for UIs and logs.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SyncSnapshot {
    pub running: bool,
    pub state: MatchState,
    pub speaker_mode: SpeakerMode,
    pub current_element_index: Option<usize>,
    pub progress: f32,
    pub velocity: f32,
    pub paused: bool,
    pub consecutive_misses: u32,
    pub element_count: usize,
    pub index_epoch: u64,
}
