use crate::error::TranscriptError;
use crate::script::DocumentNode;
use crate::speaker::SpeakerMode;
use crate::transcript::TranscriptEvent;
use std::time::Instant;

/// Inputs to the sync core, drained from one queue in arrival order.
#[derive(Debug, Clone)]
pub enum Message {
    Transcript {
        event: TranscriptEvent,
        now: Instant,
    },
    /// The debounce window of a scheduled interim result elapsed.
    InterimDue {
        request_id: u64,
        now: Instant,
    },
    RestartDue {
        now: Instant,
    },
    RestartFailed {
        error: TranscriptError,
        now: Instant,
    },
    DocumentPolled {
        nodes: Vec<DocumentNode>,
        now: Instant,
    },
    Tick {
        now: Instant,
        /// Current scroll position, when the actuator can report one.
        current_position: Option<f32>,
        /// Scroll position of the current target.
        target_position: Option<f32>,
    },
    SetSpeakerMode(SpeakerMode),
}
