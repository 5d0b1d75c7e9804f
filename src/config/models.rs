use readaloud_core::clock::{MAX_SPEED, MIN_SPEED};
use readaloud_core::{SessionSettings, SimplificationLevel};
use serde::Deserialize;
use std::path::PathBuf;

pub(crate) const MIN_FRAME_RATE_HZ: u32 = 1;
pub(crate) const MAX_FRAME_RATE_HZ: u32 = 240;

/// Flattened player configuration. On disk it is grouped into tables; see
/// `tables.rs`.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_page_budget_chars")]
    pub page_budget_chars: usize,
    #[serde(default = "crate::config::defaults::default_seek_step_secs")]
    pub seek_step_secs: f64,
    #[serde(default = "crate::config::defaults::default_speed")]
    pub speed: f64,
    #[serde(default = "crate::config::defaults::default_frame_rate_hz")]
    pub frame_rate_hz: u32,
    #[serde(default = "crate::config::defaults::default_voice")]
    pub voice: String,
    #[serde(default = "crate::config::defaults::default_tts_model")]
    pub tts_model_path: String,
    #[serde(default = "crate::config::defaults::default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default)]
    pub simplify_endpoint: Option<String>,
    #[serde(default = "crate::config::defaults::default_simplify_level")]
    pub simplify_level: SimplificationLevel,
    #[serde(default = "crate::config::defaults::default_simplify_language")]
    pub simplify_language: String,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    pub keys: KeyBindings,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            page_budget_chars: crate::config::defaults::default_page_budget_chars(),
            seek_step_secs: crate::config::defaults::default_seek_step_secs(),
            speed: crate::config::defaults::default_speed(),
            frame_rate_hz: crate::config::defaults::default_frame_rate_hz(),
            voice: crate::config::defaults::default_voice(),
            tts_model_path: crate::config::defaults::default_tts_model(),
            tts_espeak_path: crate::config::defaults::default_tts_espeak_path(),
            cache_dir: crate::config::defaults::default_cache_dir(),
            simplify_endpoint: None,
            simplify_level: crate::config::defaults::default_simplify_level(),
            simplify_language: crate::config::defaults::default_simplify_language(),
            log_level: crate::config::defaults::default_log_level(),
            keys: KeyBindings::default(),
        }
    }
}

impl AppConfig {
    /// Pull out-of-range values back to something the player can use.
    pub(crate) fn sanitized(mut self) -> Self {
        self.page_budget_chars = self.page_budget_chars.max(1);
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            self.seek_step_secs = crate::config::defaults::default_seek_step_secs();
        }
        self.speed = if self.speed.is_finite() {
            self.speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            crate::config::defaults::default_speed()
        };
        self.frame_rate_hz = self
            .frame_rate_hz
            .clamp(MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ);
        self.simplify_endpoint = self
            .simplify_endpoint
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty());
        self
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            page_budget_chars: self.page_budget_chars,
            seek_step_secs: self.seek_step_secs,
            speed: self.speed,
            voice: self.voice.clone(),
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.frame_rate_hz.max(MIN_FRAME_RATE_HZ)))
    }
}

/// Terminal key bindings, one key name per action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct KeyBindings {
    #[serde(default = "crate::config::defaults::default_key_toggle_play_pause")]
    pub toggle_play_pause: String,
    #[serde(default = "crate::config::defaults::default_key_quit")]
    pub quit: String,
    #[serde(default = "crate::config::defaults::default_key_next_page")]
    pub next_page: String,
    #[serde(default = "crate::config::defaults::default_key_prev_page")]
    pub prev_page: String,
    #[serde(default = "crate::config::defaults::default_key_speed_up")]
    pub speed_up: String,
    #[serde(default = "crate::config::defaults::default_key_speed_down")]
    pub speed_down: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            toggle_play_pause: crate::config::defaults::default_key_toggle_play_pause(),
            quit: crate::config::defaults::default_key_quit(),
            next_page: crate::config::defaults::default_key_next_page(),
            prev_page: crate::config::defaults::default_key_prev_page(),
            speed_up: crate::config::defaults::default_key_speed_up(),
            speed_down: crate::config::defaults::default_key_speed_down(),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
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
