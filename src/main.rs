//! Entry point for the read-aloud player.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Read the text, optionally simplifying it first.
//! - Pick a synthesizer and an audio output, then hand off to the player.

mod audio;
#[cfg_attr(not(feature = "piper"), allow(dead_code))]
mod cache;
mod config;
mod input;
mod player;
mod simplify;
mod tts;
mod wav;

use crate::audio::RodioRenderer;
use crate::config::{AppConfig, load_config};
use crate::player::Player;
use crate::simplify::HttpSimplifier;
use crate::tts::WavFileSynthesizer;
use anyhow::{Context, Result, anyhow};
use readaloud_core::{
    AudioRenderer, MonotonicTime, ReaderSession, SilentRenderer, Simplifier, SpeechSynthesizer,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};
use unicode_normalization::UnicodeNormalization;

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str =
    "Usage: readaloud <text-file> [--config <path>] [--audio <wav>] [--silent] [--no-simplify] [--play]";

#[derive(Debug, Clone, PartialEq, Default)]
struct CliArgs {
    text_path: PathBuf,
    config_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
    silent: bool,
    no_simplify: bool,
    autoplay: bool,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    if !args.text_path.exists() {
        return Err(anyhow!("File not found: {}", args.text_path.display()));
    }
    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("conf/config.toml"));
    let config = load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.text_path.display(),
        level = %config.log_level,
        "Starting read-aloud player"
    );
    info!(
        voice = %config.voice,
        model = %config.tts_model_path,
        speed = config.speed,
        page_budget_chars = config.page_budget_chars,
        frame_rate_hz = config.frame_rate_hz,
        "Active playback configuration"
    );

    let text = load_text(&args.text_path)?;
    let time = Rc::new(MonotonicTime::new());
    let mut session = ReaderSession::new(open_renderer(&args), time, config.session_settings());

    match simplify_text(&config, &args, &text) {
        Some(result) => session
            .apply_simplification(result)
            .context("Applying simplified text")?,
        None => session
            .load_text(text)
            .with_context(|| format!("Reading {}", args.text_path.display()))?,
    }
    if !session.summary().is_empty() {
        info!(summary = %session.summary(), "Simplified text summary");
    }

    let synthesizer = build_synthesizer(&config, &args);
    Player::new(session, synthesizer, config).run(args.autoplay)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut text_path = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--audio" => {
                let path = args.next().ok_or_else(|| anyhow!("--audio needs a path"))?;
                parsed.audio_path = Some(PathBuf::from(path));
            }
            "--silent" => parsed.silent = true,
            "--no-simplify" => parsed.no_simplify = true,
            "--play" => parsed.autoplay = true,
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown flag {flag}\n{USAGE}")),
            _ if text_path.is_none() => text_path = Some(PathBuf::from(arg)),
            _ => return Err(anyhow!("Unexpected argument {arg}\n{USAGE}")),
        }
    }
    parsed.text_path = text_path.ok_or_else(|| anyhow!(USAGE))?;
    Ok(parsed)
}

fn load_text(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let text: String = raw.nfc().collect();
    info!(chars = text.chars().count(), "Loaded text");
    Ok(text)
}

fn simplify_text(
    config: &AppConfig,
    args: &CliArgs,
    text: &str,
) -> Option<readaloud_core::SimplificationResult> {
    if args.no_simplify {
        return None;
    }
    let endpoint = config.simplify_endpoint.as_deref()?;
    let outcome = HttpSimplifier::new(endpoint).and_then(|simplifier| {
        simplifier.simplify(text, config.simplify_level, &config.simplify_language)
    });
    match outcome {
        Ok(result) => Some(result),
        Err(err) => {
            warn!("Simplification failed; reading the original text: {err}");
            None
        }
    }
}

fn open_renderer(args: &CliArgs) -> Box<dyn AudioRenderer> {
    if args.silent {
        info!("Silent mode; audio output disabled");
        return Box::new(SilentRenderer::default());
    }
    match RodioRenderer::try_default() {
        Ok(renderer) => Box::new(renderer),
        Err(err) => {
            warn!("Falling back to silent playback: {err}");
            Box::new(SilentRenderer::default())
        }
    }
}

fn build_synthesizer(config: &AppConfig, args: &CliArgs) -> Arc<dyn SpeechSynthesizer> {
    if let Some(path) = &args.audio_path {
        return Arc::new(WavFileSynthesizer::new(path.clone()));
    }
    speech_backend(config)
}

#[cfg(feature = "piper")]
fn speech_backend(config: &AppConfig) -> Arc<dyn SpeechSynthesizer> {
    let piper = crate::tts::PiperSynthesizer::new(
        PathBuf::from(&config.tts_model_path),
        PathBuf::from(&config.tts_espeak_path),
    );
    Arc::new(crate::cache::CachedSynthesizer::new(
        piper,
        config.cache_root(),
        config.tts_model_path.clone(),
    ))
}

#[cfg(not(feature = "piper"))]
fn speech_backend(config: &AppConfig) -> Arc<dyn SpeechSynthesizer> {
    crate::tts::warn_without_piper(&config.tts_model_path);
    Arc::new(crate::tts::SilentSynthesizer)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_text_path_and_flags() {
        let parsed = args(&["notes.txt", "--audio", "voice.wav", "--silent", "--play"]).unwrap();
        assert_eq!(parsed.text_path, PathBuf::from("notes.txt"));
        assert_eq!(parsed.audio_path, Some(PathBuf::from("voice.wav")));
        assert!(parsed.silent);
        assert!(parsed.autoplay);
        assert!(!parsed.no_simplify);
    }

    #[test]
    fn rejects_missing_or_extra_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.txt", "b.txt"]).is_err());
        assert!(args(&["a.txt", "--audio"]).is_err());
        assert!(args(&["a.txt", "--loud"]).is_err());
    }

    #[test]
    fn text_is_normalized_to_nfc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.txt");
        fs::write(&path, "Cafe\u{301}").unwrap();
        assert_eq!(load_text(&path).unwrap(), "Caf\u{e9}");
    }
}
