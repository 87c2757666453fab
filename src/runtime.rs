//! Single-consumer driver that wires the sync core to its collaborators.
//!
//! Transcript events and ticks are queued as messages and drained in order;
//! every effect the core returns is executed here before the next message.

use crate::error::ConfigError;
use crate::script::ScriptDocument;
use crate::speaker::SpeakerMode;
use crate::sync::{Effect, Message, SyncSnapshot, VoiceSync};
use crate::transcript::{TranscriptEvent, TranscriptSource};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Receives scroll commands. Positions are scroll coordinates.
pub trait ScrollActuator {
    /// Take control of scrolling; false while the viewport is unavailable.
    fn acquire(&mut self) -> bool;
    fn release(&mut self);
    /// Pixels per second, never negative.
    fn set_velocity(&mut self, velocity: f32);
    fn move_to_offset(&mut self, position: f32, smooth: bool, align_top: bool);
    fn current_position(&self) -> Option<f32>;
}

/// In-memory scroller that integrates commanded velocity over time.
#[derive(Debug, Clone, Default)]
pub struct SimulatedScroller {
    position: f32,
    velocity: f32,
    max_position: f32,
    acquired: bool,
    last_advance: Option<Instant>,
    moves: Vec<f32>,
}

impl SimulatedScroller {
    pub fn new(max_position: f32) -> Self {
        Self {
            max_position: max_position.max(0.0),
            ..Self::default()
        }
    }

    /// Move by `velocity * elapsed` since the previous call.
    pub fn advance(&mut self, now: Instant) {
        if let Some(previous) = self.last_advance {
            let elapsed = now.saturating_duration_since(previous).as_secs_f32();
            self.position = (self.position + self.velocity * elapsed).clamp(0.0, self.max_position);
        }
        self.last_advance = Some(now);
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Every position a move command targeted, in order.
    pub fn moves(&self) -> &[f32] {
        &self.moves
    }
}

impl ScrollActuator for SimulatedScroller {
    fn acquire(&mut self) -> bool {
        self.acquired = true;
        true
    }

    fn release(&mut self) {
        self.acquired = false;
        self.velocity = 0.0;
    }

    fn set_velocity(&mut self, velocity: f32) {
        self.velocity = velocity.max(0.0);
    }

    fn move_to_offset(&mut self, position: f32, _smooth: bool, _align_top: bool) {
        self.position = position.clamp(0.0, self.max_position);
        self.moves.push(self.position);
    }

    fn current_position(&self) -> Option<f32> {
        self.acquired.then_some(self.position)
    }
}

pub struct SyncRuntime<D, A, T> {
    sync: VoiceSync,
    document: D,
    actuator: A,
    transcript: T,
    queue: VecDeque<Message>,
    start_requested: bool,
    acquired: bool,
    interim_timer: Option<(u64, Instant)>,
    restart_timer: Option<Instant>,
    next_poll: Option<Instant>,
}

impl<D, A, T> SyncRuntime<D, A, T>
where
    D: ScriptDocument,
    A: ScrollActuator,
    T: TranscriptSource,
{
    pub fn new(sync: VoiceSync, document: D, actuator: A, transcript: T) -> Self {
        Self {
            sync,
            document,
            actuator,
            transcript,
            queue: VecDeque::new(),
            start_requested: false,
            acquired: false,
            interim_timer: None,
            restart_timer: None,
            next_poll: None,
        }
    }

    /// Start now if every collaborator is ready, otherwise on a later tick.
    pub fn start(&mut self, now: Instant) -> bool {
        self.start_requested = true;
        self.try_start(now)
    }

    pub fn stop(&mut self, now: Instant) {
        self.start_requested = false;
        self.interim_timer = None;
        self.restart_timer = None;
        self.next_poll = None;
        self.queue.clear();
        let effects = self.sync.stop();
        self.run_effects(effects, now);
        if self.acquired {
            self.actuator.release();
            self.acquired = false;
        }
    }

    pub fn push_transcript(&mut self, event: TranscriptEvent, now: Instant) {
        self.queue.push_back(Message::Transcript { event, now });
        self.drain(now);
    }

    pub fn set_speaker_mode(&mut self, mode: SpeakerMode, now: Instant) {
        self.queue.push_back(Message::SetSpeakerMode(mode));
        self.drain(now);
    }

    /// Switch speaker mode from a user-supplied name such as `"external"`.
    pub fn set_speaker_mode_named(&mut self, name: &str, now: Instant) -> Result<(), ConfigError> {
        let mode = name.parse::<SpeakerMode>()?;
        self.set_speaker_mode(mode, now);
        Ok(())
    }

    /// One control period: fire due timers, poll the document, then run the
    /// velocity controller.
    pub fn tick(&mut self, now: Instant) {
        if self.start_requested && !self.try_start(now) {
            return;
        }
        if !self.sync.is_running() {
            return;
        }

        if let Some((request_id, due)) = self.interim_timer {
            if now >= due {
                self.interim_timer = None;
                self.queue.push_back(Message::InterimDue { request_id, now });
            }
        }
        if let Some(due) = self.restart_timer {
            if now >= due {
                self.restart_timer = None;
                self.queue.push_back(Message::RestartDue { now });
            }
        }
        if self.next_poll.is_some_and(|due| now >= due) {
            self.next_poll = Some(now + self.sync.config().transcript.document_poll);
            if let Some(nodes) = self.document.nodes() {
                self.queue.push_back(Message::DocumentPolled { nodes, now });
            }
        }
        self.drain(now);

        let target_position = self
            .sync
            .target_offset()
            .map(|offset| self.document.offset_to_scroll_position(offset));
        self.queue.push_back(Message::Tick {
            now,
            current_position: self.actuator.current_position(),
            target_position,
        });
        self.drain(now);
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.sync.snapshot()
    }

    pub fn is_start_pending(&self) -> bool {
        self.start_requested
    }

    pub fn sync(&self) -> &VoiceSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut VoiceSync {
        &mut self.sync
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn transcript(&self) -> &T {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut T {
        &mut self.transcript
    }

    fn try_start(&mut self, now: Instant) -> bool {
        let Some(nodes) = self.document.nodes() else {
            debug!("Script document not ready; deferring start");
            return false;
        };
        if !self.acquired {
            if !self.actuator.acquire() {
                debug!("Scroll actuator unavailable; deferring start");
                return false;
            }
            self.acquired = true;
        }

        self.start_requested = false;
        let effects = self.sync.start(&nodes, now);
        self.run_effects(effects, now);
        self.next_poll = Some(now + self.sync.config().transcript.document_poll);
        info!(nodes = nodes.len(), "Runtime started");
        if let Err(error) = self.transcript.restart() {
            self.queue.push_back(Message::RestartFailed { error, now });
            self.drain(now);
        }
        true
    }

    fn drain(&mut self, now: Instant) {
        while let Some(message) = self.queue.pop_front() {
            let effects = self.sync.update(message);
            self.run_effects(effects, now);
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            self.run_effect(effect, now);
        }
    }

    fn run_effect(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::SetVelocity(velocity) => self.actuator.set_velocity(velocity),
            Effect::MoveToOffset {
                offset,
                smooth,
                align_top,
            } => {
                let position = self.document.offset_to_scroll_position(offset);
                self.actuator.move_to_offset(position, smooth, align_top);
            }
            Effect::ScheduleInterim { request_id, due } => {
                self.interim_timer = Some((request_id, due));
            }
            Effect::ScheduleRestart { due } => self.restart_timer = Some(due),
            Effect::RestartTranscript => {
                if let Err(error) = self.transcript.restart() {
                    warn!(%error, "Transcript restart failed");
                    self.queue.push_back(Message::RestartFailed { error, now });
                }
            }
            Effect::StopTranscript => self.transcript.stop(),
            Effect::ReleaseScroll => {
                if self.acquired {
                    self.actuator.release();
                    self.acquired = false;
                }
            }
        }
    }
}
