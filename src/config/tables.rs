use super::defaults;
use super::models::{
    DebugFlags, LogLevel, MatchingConfig, SpeakerConfig, SyncConfig, TrackingConfig,
    TranscriptConfig, VelocityConfig,
};
use crate::speaker::SpeakerMode;
use crate::tags::TagPatternConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// On-disk layout of `voicesync.toml`. Durations are stored as milliseconds.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    matching: MatchingTable,
    #[serde(default)]
    tracking: TrackingTable,
    #[serde(default)]
    speaker: SpeakerTable,
    #[serde(default)]
    velocity: VelocityTable,
    #[serde(default)]
    transcript: TranscriptTable,
    #[serde(default)]
    tags: TagPatternConfig,
    #[serde(default)]
    logging: LoggingTable,
}

impl From<ConfigTables> for SyncConfig {
    fn from(tables: ConfigTables) -> Self {
        let ConfigTables {
            matching,
            tracking,
            speaker,
            velocity,
            transcript,
            tags,
            logging,
        } = tables;

        SyncConfig {
            matching: MatchingConfig {
                search_threshold: matching.search_threshold,
                locked_threshold: matching.locked_threshold,
                external_threshold: matching.external_threshold,
                lookahead: matching.lookahead,
                expanded_lookahead: matching.expanded_lookahead,
                expand_after_misses: matching.expand_after_misses,
                progress_words: matching.progress_words,
                window_words: matching.window_words,
            },
            tracking: TrackingConfig {
                max_consecutive_misses: tracking.max_consecutive_misses,
                near_end_miss_limit: tracking.near_end_miss_limit,
                near_end_progress: tracking.near_end_progress,
                progress_hysteresis: tracking.progress_hysteresis,
            },
            speaker: SpeakerConfig {
                initial_mode: speaker.initial_mode,
                max_external_elements: speaker.max_external_elements,
                entry_markers: speaker.entry_markers,
                exit_markers: speaker.exit_markers,
            },
            velocity: VelocityConfig {
                tick: Duration::from_millis(velocity.tick_ms),
                dead_zone_px: velocity.dead_zone_px,
                gain: velocity.gain,
                max_velocity: velocity.max_velocity,
                smoothing: velocity.smoothing,
                braking: velocity.braking,
                large_jump_px: velocity.large_jump_px,
                jump_min_confidence: velocity.jump_min_confidence,
                full_speed_silence: Duration::from_millis(velocity.full_speed_silence_ms),
                slow_silence: Duration::from_millis(velocity.slow_silence_ms),
                stop_silence: Duration::from_millis(velocity.stop_silence_ms),
                slow_factor: velocity.slow_factor,
            },
            transcript: TranscriptConfig {
                interim_debounce: Duration::from_millis(transcript.interim_debounce_ms),
                restart_delay: Duration::from_millis(transcript.restart_delay_ms),
                document_poll: Duration::from_millis(transcript.document_poll_ms),
                document_debounce: Duration::from_millis(transcript.document_debounce_ms),
            },
            tags,
            log_level: logging.log_level,
            debug: DebugFlags {
                matching: logging.debug_matching,
                velocity: logging.debug_velocity,
                speaker: logging.debug_speaker,
            },
        }
    }
}

impl From<&SyncConfig> for ConfigTables {
    fn from(config: &SyncConfig) -> Self {
        let millis = |duration: Duration| duration.as_millis() as u64;
        ConfigTables {
            matching: MatchingTable {
                search_threshold: config.matching.search_threshold,
                locked_threshold: config.matching.locked_threshold,
                external_threshold: config.matching.external_threshold,
                lookahead: config.matching.lookahead,
                expanded_lookahead: config.matching.expanded_lookahead,
                expand_after_misses: config.matching.expand_after_misses,
                progress_words: config.matching.progress_words,
                window_words: config.matching.window_words,
            },
            tracking: TrackingTable {
                max_consecutive_misses: config.tracking.max_consecutive_misses,
                near_end_miss_limit: config.tracking.near_end_miss_limit,
                near_end_progress: config.tracking.near_end_progress,
                progress_hysteresis: config.tracking.progress_hysteresis,
            },
            speaker: SpeakerTable {
                initial_mode: config.speaker.initial_mode,
                max_external_elements: config.speaker.max_external_elements,
                entry_markers: config.speaker.entry_markers.clone(),
                exit_markers: config.speaker.exit_markers.clone(),
            },
            velocity: VelocityTable {
                tick_ms: millis(config.velocity.tick),
                dead_zone_px: config.velocity.dead_zone_px,
                gain: config.velocity.gain,
                max_velocity: config.velocity.max_velocity,
                smoothing: config.velocity.smoothing,
                braking: config.velocity.braking,
                large_jump_px: config.velocity.large_jump_px,
                jump_min_confidence: config.velocity.jump_min_confidence,
                full_speed_silence_ms: millis(config.velocity.full_speed_silence),
                slow_silence_ms: millis(config.velocity.slow_silence),
                stop_silence_ms: millis(config.velocity.stop_silence),
                slow_factor: config.velocity.slow_factor,
            },
            transcript: TranscriptTable {
                interim_debounce_ms: millis(config.transcript.interim_debounce),
                restart_delay_ms: millis(config.transcript.restart_delay),
                document_poll_ms: millis(config.transcript.document_poll),
                document_debounce_ms: millis(config.transcript.document_debounce),
            },
            tags: config.tags.clone(),
            logging: LoggingTable {
                log_level: config.log_level,
                debug_matching: config.debug.matching,
                debug_velocity: config.debug.velocity,
                debug_speaker: config.debug.speaker,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct MatchingTable {
    #[serde(default = "defaults::default_search_threshold")]
    search_threshold: f32,
    #[serde(default = "defaults::default_locked_threshold")]
    locked_threshold: f32,
    #[serde(default = "defaults::default_external_threshold")]
    external_threshold: f32,
    #[serde(default = "defaults::default_lookahead")]
    lookahead: usize,
    #[serde(default = "defaults::default_expanded_lookahead")]
    expanded_lookahead: usize,
    #[serde(default = "defaults::default_expand_after_misses")]
    expand_after_misses: u32,
    #[serde(default = "defaults::default_progress_words")]
    progress_words: usize,
    #[serde(default = "defaults::default_window_words")]
    window_words: usize,
}

impl Default for MatchingTable {
    fn default() -> Self {
        MatchingTable {
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

#[derive(Debug, Clone, Deserialize, Serialize)]
struct TrackingTable {
    #[serde(default = "defaults::default_max_consecutive_misses")]
    max_consecutive_misses: u32,
    #[serde(default = "defaults::default_near_end_miss_limit")]
    near_end_miss_limit: u32,
    #[serde(default = "defaults::default_near_end_progress")]
    near_end_progress: f32,
    #[serde(default = "defaults::default_progress_hysteresis")]
    progress_hysteresis: f32,
}

impl Default for TrackingTable {
    fn default() -> Self {
        TrackingTable {
            max_consecutive_misses: defaults::default_max_consecutive_misses(),
            near_end_miss_limit: defaults::default_near_end_miss_limit(),
            near_end_progress: defaults::default_near_end_progress(),
            progress_hysteresis: defaults::default_progress_hysteresis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SpeakerTable {
    #[serde(default)]
    initial_mode: SpeakerMode,
    #[serde(default = "defaults::default_max_external_elements")]
    max_external_elements: usize,
    #[serde(default)]
    entry_markers: Vec<String>,
    #[serde(default)]
    exit_markers: Vec<String>,
}

impl Default for SpeakerTable {
    fn default() -> Self {
        SpeakerTable {
            initial_mode: SpeakerMode::Anchor,
            max_external_elements: defaults::default_max_external_elements(),
            entry_markers: Vec::new(),
            exit_markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct VelocityTable {
    #[serde(default = "defaults::default_tick_ms")]
    tick_ms: u64,
    #[serde(default = "defaults::default_dead_zone_px")]
    dead_zone_px: f32,
    #[serde(default = "defaults::default_gain")]
    gain: f32,
    #[serde(default = "defaults::default_max_velocity")]
    max_velocity: f32,
    #[serde(default = "defaults::default_smoothing")]
    smoothing: f32,
    #[serde(default = "defaults::default_braking")]
    braking: f32,
    #[serde(default = "defaults::default_large_jump_px")]
    large_jump_px: f32,
    #[serde(default = "defaults::default_jump_min_confidence")]
    jump_min_confidence: f32,
    #[serde(default = "defaults::default_full_speed_silence_ms")]
    full_speed_silence_ms: u64,
    #[serde(default = "defaults::default_slow_silence_ms")]
    slow_silence_ms: u64,
    #[serde(default = "defaults::default_stop_silence_ms")]
    stop_silence_ms: u64,
    #[serde(default = "defaults::default_slow_factor")]
    slow_factor: f32,
}

impl Default for VelocityTable {
    fn default() -> Self {
        VelocityTable {
            tick_ms: defaults::default_tick_ms(),
            dead_zone_px: defaults::default_dead_zone_px(),
            gain: defaults::default_gain(),
            max_velocity: defaults::default_max_velocity(),
            smoothing: defaults::default_smoothing(),
            braking: defaults::default_braking(),
            large_jump_px: defaults::default_large_jump_px(),
            jump_min_confidence: defaults::default_jump_min_confidence(),
            full_speed_silence_ms: defaults::default_full_speed_silence_ms(),
            slow_silence_ms: defaults::default_slow_silence_ms(),
            stop_silence_ms: defaults::default_stop_silence_ms(),
            slow_factor: defaults::default_slow_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct TranscriptTable {
    #[serde(default = "defaults::default_interim_debounce_ms")]
    interim_debounce_ms: u64,
    #[serde(default = "defaults::default_restart_delay_ms")]
    restart_delay_ms: u64,
    #[serde(default = "defaults::default_document_poll_ms")]
    document_poll_ms: u64,
    #[serde(default = "defaults::default_document_debounce_ms")]
    document_debounce_ms: u64,
}

impl Default for TranscriptTable {
    fn default() -> Self {
        TranscriptTable {
            interim_debounce_ms: defaults::default_interim_debounce_ms(),
            restart_delay_ms: defaults::default_restart_delay_ms(),
            document_poll_ms: defaults::default_document_poll_ms(),
            document_debounce_ms: defaults::default_document_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingTable {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
    #[serde(default)]
    debug_matching: bool,
    #[serde(default)]
    debug_velocity: bool,
    #[serde(default)]
    debug_speaker: bool,
}

impl Default for LoggingTable {
    fn default() -> Self {
        LoggingTable {
            log_level: defaults::default_log_level(),
            debug_matching: false,
            debug_velocity: false,
            debug_speaker: false,
        }
    }
}
