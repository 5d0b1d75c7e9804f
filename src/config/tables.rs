use super::defaults;
use super::models::{AppConfig, KeyBindings, LogLevel};
use readaloud_core::SimplificationLevel;
use serde::Deserialize;

/// On-disk layout of `conf/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    tts: TtsConfig,
    #[serde(default)]
    simplify: SimplifyConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    keys: KeyBindings,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            page_budget_chars: tables.reading.page_budget_chars,
            seek_step_secs: tables.reading.seek_step_secs,
            speed: tables.playback.speed,
            frame_rate_hz: tables.playback.frame_rate_hz,
            voice: tables.tts.voice,
            tts_model_path: tables.tts.tts_model_path,
            tts_espeak_path: tables.tts.tts_espeak_path,
            cache_dir: tables.tts.cache_dir,
            simplify_endpoint: tables.simplify.endpoint,
            simplify_level: tables.simplify.level,
            simplify_language: tables.simplify.language,
            log_level: tables.logging.log_level,
            keys: tables.keys,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_page_budget_chars")]
    page_budget_chars: usize,
    #[serde(default = "defaults::default_seek_step_secs")]
    seek_step_secs: f64,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            page_budget_chars: defaults::default_page_budget_chars(),
            seek_step_secs: defaults::default_seek_step_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_speed")]
    speed: f64,
    #[serde(default = "defaults::default_frame_rate_hz")]
    frame_rate_hz: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            speed: defaults::default_speed(),
            frame_rate_hz: defaults::default_frame_rate_hz(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TtsConfig {
    #[serde(default = "defaults::default_voice")]
    voice: String,
    #[serde(default = "defaults::default_tts_model")]
    tts_model_path: String,
    #[serde(default = "defaults::default_tts_espeak_path")]
    tts_espeak_path: String,
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            voice: defaults::default_voice(),
            tts_model_path: defaults::default_tts_model(),
            tts_espeak_path: defaults::default_tts_espeak_path(),
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct SimplifyConfig {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default = "defaults::default_simplify_level")]
    level: SimplificationLevel,
    #[serde(default = "defaults::default_simplify_language")]
    language: String,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        SimplifyConfig {
            endpoint: None,
            level: defaults::default_simplify_level(),
            language: defaults::default_simplify_language(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
