use std::time::Instant;

mod matching;
mod reducer;
mod scroll;

/// Describes work that must be performed outside the pure reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetVelocity(f32),
    /// Move so that the document `offset` sits on the reading line.
    MoveToOffset {
        offset: f32,
        smooth: bool,
        align_top: bool,
    },
    ScheduleInterim {
        request_id: u64,
        due: Instant,
    },
    ScheduleRestart {
        due: Instant,
    },
    RestartTranscript,
    StopTranscript,
    ReleaseScroll,
}
