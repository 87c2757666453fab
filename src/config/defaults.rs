pub(crate) fn default_search_threshold() -> f32 {
    0.20
}

pub(crate) fn default_locked_threshold() -> f32 {
    0.16
}

pub(crate) fn default_external_threshold() -> f32 {
    0.40
}

pub(crate) fn default_lookahead() -> usize {
    6
}

pub(crate) fn default_expanded_lookahead() -> usize {
    20
}

pub(crate) fn default_expand_after_misses() -> u32 {
    2
}

pub(crate) fn default_progress_words() -> usize {
    5
}

pub(crate) fn default_window_words() -> usize {
    12
}

pub(crate) fn default_max_consecutive_misses() -> u32 {
    2
}

pub(crate) fn default_near_end_miss_limit() -> u32 {
    5
}

pub(crate) fn default_near_end_progress() -> f32 {
    0.9
}

pub(crate) fn default_progress_hysteresis() -> f32 {
    0.02
}

pub(crate) fn default_max_external_elements() -> usize {
    50
}

pub(crate) fn default_tick_ms() -> u64 {
    50
}

pub(crate) fn default_dead_zone_px() -> f32 {
    25.0
}

pub(crate) fn default_gain() -> f32 {
    1.5
}

pub(crate) fn default_max_velocity() -> f32 {
    400.0
}

pub(crate) fn default_smoothing() -> f32 {
    0.2
}

pub(crate) fn default_braking() -> f32 {
    0.5
}

pub(crate) fn default_large_jump_px() -> f32 {
    500.0
}

pub(crate) fn default_jump_min_confidence() -> f32 {
    0.4
}

pub(crate) fn default_full_speed_silence_ms() -> u64 {
    1_000
}

pub(crate) fn default_slow_silence_ms() -> u64 {
    2_500
}

pub(crate) fn default_stop_silence_ms() -> u64 {
    5_000
}

pub(crate) fn default_slow_factor() -> f32 {
    0.3
}

pub(crate) fn default_interim_debounce_ms() -> u64 {
    200
}

pub(crate) fn default_restart_delay_ms() -> u64 {
    300
}

pub(crate) fn default_document_poll_ms() -> u64 {
    500
}

pub(crate) fn default_document_debounce_ms() -> u64 {
    750
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}
