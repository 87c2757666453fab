//! Closed-loop scroll velocity controller.
//!
//! Positions are scroll coordinates that grow as reading advances, so a
//! positive error means the view is behind the speaker. The controller only
//! ever scrolls forward; overshoot is handled by braking to a stop and letting
//! the speaker catch up.

use crate::config::VelocityConfig;
use std::time::{Duration, Instant};
use tracing::debug;

/// What the controller wants the actuator to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    /// Rounded, clamped to `0..=max_velocity`.
    pub velocity: f32,
    /// Issue a one-shot smooth move to the target instead of chasing it.
    pub jump: bool,
    pub error: f32,
}

/// Inputs sampled by the runtime for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ControlInput {
    pub now: Instant,
    pub current: f32,
    pub target: f32,
    pub confidence: f32,
    /// False while searching or paused after a miss.
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct VelocityController {
    config: VelocityConfig,
    current_velocity: f32,
    last_update: Option<Instant>,
    last_speech: Option<Instant>,
    jump_armed: bool,
    debug: bool,
}

impl VelocityController {
    pub fn new(config: VelocityConfig) -> Self {
        Self {
            config,
            current_velocity: 0.0,
            last_update: None,
            last_speech: None,
            jump_armed: false,
            debug: false,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.current_velocity = 0.0;
        self.last_update = Some(now);
        self.last_speech = Some(now);
        self.jump_armed = false;
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Confirmed speech was matched; restores full speed.
    pub fn on_speech(&mut self, now: Instant) {
        self.last_speech = Some(now);
    }

    /// Allow one hybrid jump for the latest match.
    pub fn arm_jump(&mut self) {
        self.jump_armed = true;
    }

    pub fn current_velocity(&self) -> f32 {
        self.current_velocity
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn tick(&mut self, input: ControlInput) -> ControlOutput {
        self.last_update = Some(input.now);
        let error = input.target - input.current;

        if !input.active {
            // Smoothed velocity is kept so scrolling resumes where it left off.
            return ControlOutput {
                velocity: 0.0,
                jump: false,
                error,
            };
        }

        if self.jump_armed
            && error.abs() > self.config.large_jump_px
            && input.confidence >= self.config.jump_min_confidence
        {
            self.jump_armed = false;
            if self.debug {
                debug!(error, confidence = input.confidence, "Large offset; jumping to target");
            }
            return ControlOutput {
                velocity: 0.0,
                jump: true,
                error,
            };
        }

        if error.abs() < self.config.dead_zone_px {
            self.current_velocity = 0.0;
            return ControlOutput {
                velocity: 0.0,
                jump: false,
                error,
            };
        }

        if error > 0.0 {
            let desired = (error * self.config.gain).min(self.config.max_velocity);
            self.current_velocity += (desired - self.current_velocity) * self.config.smoothing;
        } else {
            self.current_velocity -= self.current_velocity * self.config.braking;
        }

        let silence = self.silence_factor(input.now);
        let velocity = (self.current_velocity * silence)
            .clamp(0.0, self.config.max_velocity)
            .round();
        if self.debug {
            debug!(
                error,
                smoothed = self.current_velocity,
                silence,
                velocity,
                "Velocity tick"
            );
        }
        ControlOutput {
            velocity,
            jump: false,
            error,
        }
    }

    /// Speed multiplier from time since the last confirmed speech.
    pub fn silence_factor(&self, now: Instant) -> f32 {
        let silent = self
            .last_speech
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::ZERO);
        let full = self.config.full_speed_silence;
        let slow = self.config.slow_silence;
        let stop = self.config.stop_silence;
        let slow_factor = self.config.slow_factor;

        if silent <= full {
            1.0
        } else if silent <= slow {
            let t = ratio(silent - full, slow - full);
            1.0 - t * (1.0 - slow_factor)
        } else if silent < stop {
            let t = ratio(silent - slow, stop - slow);
            slow_factor * (1.0 - t)
        } else {
            0.0
        }
    }
}

fn ratio(part: Duration, whole: Duration) -> f32 {
    if whole.is_zero() {
        1.0
    } else {
        (part.as_secs_f32() / whole.as_secs_f32()).clamp(0.0, 1.0)
    }
}
