use readaloud_core::SimplificationLevel;

pub(crate) fn default_page_budget_chars() -> usize {
    1200
}

pub(crate) fn default_seek_step_secs() -> f64 {
    5.0
}

pub(crate) fn default_speed() -> f64 {
    1.0
}

pub(crate) fn default_frame_rate_hz() -> u32 {
    60
}

pub(crate) fn default_voice() -> String {
    "en_US-ryan-high".to_string()
}

pub(crate) fn default_tts_model() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

pub(crate) fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_simplify_level() -> SimplificationLevel {
    SimplificationLevel::Standard
}

pub(crate) fn default_simplify_language() -> String {
    "English".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_key_toggle_play_pause() -> String {
    "space".to_string()
}

pub(crate) fn default_key_quit() -> String {
    "q".to_string()
}

pub(crate) fn default_key_next_page() -> String {
    "n".to_string()
}

pub(crate) fn default_key_prev_page() -> String {
    "b".to_string()
}

pub(crate) fn default_key_speed_up() -> String {
    "+".to_string()
}

pub(crate) fn default_key_speed_down() -> String {
    "-".to_string()
}
