use super::defaults;
use crate::error::ConfigError;
use crate::speaker::SpeakerMode;
use crate::tags::TagPatternConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fully resolved settings for one sync session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncConfig {
    pub matching: MatchingConfig,
    pub tracking: TrackingConfig,
    pub speaker: SpeakerConfig,
    pub velocity: VelocityConfig,
    pub transcript: TranscriptConfig,
    pub tags: TagPatternConfig,
    pub log_level: LogLevel,
    pub debug: DebugFlags,
}

/// Similarity thresholds and search windows.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub search_threshold: f32,
    pub locked_threshold: f32,
    pub external_threshold: f32,
    pub lookahead: usize,
    pub expanded_lookahead: usize,
    /// Near-end misses after which the expanded lookahead applies.
    pub expand_after_misses: u32,
    /// Trailing spoken words used to estimate progress inside an element.
    pub progress_words: usize,
    /// Spoken words handed to the aligner per result.
    pub window_words: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            search_threshold: defaults::default_search_threshold(),
            locked_threshold: defaults::default_locked_threshold(),
            external_threshold: defaults::default_external_threshold(),
            lookahead: defaults::default_lookahead(),
            expanded_lookahead: defaults::default_expanded_lookahead(),
            expand_after_misses: defaults::default_expand_after_misses(),
            progress_words: defaults::default_progress_words(),
            window_words: defaults::default_window_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    pub max_consecutive_misses: u32,
    pub near_end_miss_limit: u32,
    pub near_end_progress: f32,
    /// Minimum progress change for an interim result to move the target.
    pub progress_hysteresis: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_consecutive_misses: defaults::default_max_consecutive_misses(),
            near_end_miss_limit: defaults::default_near_end_miss_limit(),
            near_end_progress: defaults::default_near_end_progress(),
            progress_hysteresis: defaults::default_progress_hysteresis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerConfig {
    pub initial_mode: SpeakerMode,
    pub max_external_elements: usize,
    pub entry_markers: Vec<String>,
    pub exit_markers: Vec<String>,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            initial_mode: SpeakerMode::Anchor,
            max_external_elements: defaults::default_max_external_elements(),
            entry_markers: Vec::new(),
            exit_markers: Vec::new(),
        }
    }
}

/// Scroll controller tuning. Velocities are in pixels per second.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityConfig {
    pub tick: Duration,
    pub dead_zone_px: f32,
    pub gain: f32,
    pub max_velocity: f32,
    pub smoothing: f32,
    pub braking: f32,
    pub large_jump_px: f32,
    pub jump_min_confidence: f32,
    pub full_speed_silence: Duration,
    pub slow_silence: Duration,
    pub stop_silence: Duration,
    pub slow_factor: f32,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(defaults::default_tick_ms()),
            dead_zone_px: defaults::default_dead_zone_px(),
            gain: defaults::default_gain(),
            max_velocity: defaults::default_max_velocity(),
            smoothing: defaults::default_smoothing(),
            braking: defaults::default_braking(),
            large_jump_px: defaults::default_large_jump_px(),
            jump_min_confidence: defaults::default_jump_min_confidence(),
            full_speed_silence: Duration::from_millis(defaults::default_full_speed_silence_ms()),
            slow_silence: Duration::from_millis(defaults::default_slow_silence_ms()),
            stop_silence: Duration::from_millis(defaults::default_stop_silence_ms()),
            slow_factor: defaults::default_slow_factor(),
        }
    }
}

/// Timers owned by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptConfig {
    pub interim_debounce: Duration,
    pub restart_delay: Duration,
    pub document_poll: Duration,
    pub document_debounce: Duration,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            interim_debounce: Duration::from_millis(defaults::default_interim_debounce_ms()),
            restart_delay: Duration::from_millis(defaults::default_restart_delay_ms()),
            document_poll: Duration::from_millis(defaults::default_document_poll_ms()),
            document_debounce: Duration::from_millis(defaults::default_document_debounce_ms()),
        }
    }
}

/// Runtime switches for the chatty per-result and per-tick debug events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugFlags {
    #[serde(default)]
    pub matching: bool,
    #[serde(default)]
    pub velocity: bool,
    #[serde(default)]
    pub speaker: bool,
}

impl SyncConfig {
    /// Reject values the matcher and controller cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.matching;
        unit_interval("matching.search_threshold", m.search_threshold)?;
        unit_interval("matching.locked_threshold", m.locked_threshold)?;
        unit_interval("matching.external_threshold", m.external_threshold)?;
        at_least_one("matching.progress_words", m.progress_words)?;
        at_least_one("matching.window_words", m.window_words)?;
        if m.expanded_lookahead < m.lookahead {
            return Err(ConfigError::OutOfRange {
                field: "matching.expanded_lookahead",
                value: m.expanded_lookahead as f64,
            });
        }

        let t = &self.tracking;
        at_least_one("tracking.max_consecutive_misses", t.max_consecutive_misses as usize)?;
        at_least_one("tracking.near_end_miss_limit", t.near_end_miss_limit as usize)?;
        unit_interval("tracking.near_end_progress", t.near_end_progress)?;
        unit_interval("tracking.progress_hysteresis", t.progress_hysteresis)?;

        at_least_one(
            "speaker.max_external_elements",
            self.speaker.max_external_elements,
        )?;

        let v = &self.velocity;
        if v.tick.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "velocity.tick_ms",
                value: 0.0,
            });
        }
        non_negative("velocity.dead_zone_px", v.dead_zone_px)?;
        positive("velocity.gain", v.gain)?;
        positive("velocity.max_velocity", v.max_velocity)?;
        positive("velocity.smoothing", v.smoothing)?;
        unit_interval("velocity.smoothing", v.smoothing)?;
        positive("velocity.braking", v.braking)?;
        unit_interval("velocity.braking", v.braking)?;
        non_negative("velocity.large_jump_px", v.large_jump_px)?;
        unit_interval("velocity.jump_min_confidence", v.jump_min_confidence)?;
        unit_interval("velocity.slow_factor", v.slow_factor)?;
        if !(v.full_speed_silence <= v.slow_silence && v.slow_silence < v.stop_silence) {
            return Err(ConfigError::OutOfRange {
                field: "velocity.slow_silence_ms",
                value: v.slow_silence.as_millis() as f64,
            });
        }
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
        })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
        })
    }
}

fn at_least_one(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
        })
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SyncConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        let mut config = SyncConfig::default();
        config.matching.locked_threshold = 1.5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "matching.locked_threshold",
                value: 1.5
            })
        );
    }

    #[test]
    fn rejects_unordered_silence_ramp() {
        let mut config = SyncConfig::default();
        config.velocity.slow_silence = Duration::from_secs(6);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "velocity.slow_silence_ms",
                ..
            })
        ));
    }
}
