//! Speech synthesizers for the player.
//!
//! With the `piper` feature the player speaks through `piper-rs`; otherwise it
//! can read pre-recorded narration from a WAV file or fall back to timed
//! silence so highlighting still runs without a voice model.

use crate::wav::read_wav;
use readaloud_core::{AudioBuffer, SpeechSynthesizer, SynthesisError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Speaking rate assumed for silent playback.
pub const SILENT_CHARS_PER_SEC: f64 = 15.0;
const SILENT_SAMPLE_RATE: u32 = 8_000;

/// Produces silence as long as the text would take to read aloud.
#[derive(Debug, Clone, Default)]
pub struct SilentSynthesizer;

impl SpeechSynthesizer for SilentSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, SynthesisError> {
        let chars = text.chars().count();
        if chars == 0 {
            return Err(SynthesisError::Empty);
        }
        let seconds = chars as f64 / SILENT_CHARS_PER_SEC;
        debug!(chars, seconds, %voice, "Producing silent narration");
        Ok(AudioBuffer::silent(seconds, SILENT_SAMPLE_RATE))
    }
}

/// Plays a recording supplied on the command line, whatever the text.
#[derive(Debug, Clone)]
pub struct WavFileSynthesizer {
    path: PathBuf,
}

impl WavFileSynthesizer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SpeechSynthesizer for WavFileSynthesizer {
    fn synthesize(&self, _text: &str, voice: &str) -> Result<AudioBuffer, SynthesisError> {
        info!(path = %self.path.display(), %voice, "Loading narration from file");
        let buffer =
            read_wav(&self.path).map_err(|err| SynthesisError::Backend(format!("{err:#}")))?;
        if buffer.frame_count() == 0 {
            return Err(SynthesisError::Empty);
        }
        Ok(buffer)
    }
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that to avoid
/// duplicated segments like `/espeak-ng-data/espeak-ng-data/phonindex`.
#[cfg_attr(not(feature = "piper"), allow(dead_code))]
pub fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path
        .file_name()
        .map(|n| n == "espeak-ng-data")
        .unwrap_or(false)
    {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

/// The model file for `voice`: the configured model when its stem matches,
/// otherwise a sibling `<voice>.onnx`.
#[cfg_attr(not(feature = "piper"), allow(dead_code))]
pub fn model_for_voice(model_path: &Path, voice: &str) -> PathBuf {
    let matches_default = model_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem == voice)
        .unwrap_or(false);
    if matches_default || voice.is_empty() {
        return model_path.to_path_buf();
    }
    model_path.with_file_name(format!("{voice}.onnx"))
}

#[cfg_attr(not(feature = "piper"), allow(dead_code))]
pub fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path
        .extension()
        .map(|ext| ext == "onnx")
        .unwrap_or(false)
    {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

#[cfg(feature = "piper")]
pub use piper::PiperSynthesizer;

#[cfg(feature = "piper")]
mod piper {
    use super::{model_for_voice, resolve_piper_config, sanitize_espeak_root};
    use piper_rs::from_config_path;
    use piper_rs::synth::PiperSpeechSynthesizer;
    use readaloud_core::{AudioBuffer, SpeechSynthesizer, SynthesisError};
    use std::env;
    use std::path::PathBuf;
    use tracing::{debug, info, warn};

    pub struct PiperSynthesizer {
        model_path: PathBuf,
    }

    impl PiperSynthesizer {
        pub fn new(model_path: PathBuf, espeak_path: PathBuf) -> Self {
            let espeak_path = sanitize_espeak_root(espeak_path);
            if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
                // Safe because this runs during startup before worker threads exist.
                unsafe {
                    env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
                }
            }
            info!(
                model = %model_path.display(),
                espeak_root = %espeak_path.display(),
                "Initializing Piper synthesizer"
            );
            Self { model_path }
        }
    }

    impl SpeechSynthesizer for PiperSynthesizer {
        fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, SynthesisError> {
            let model_path = model_for_voice(&self.model_path, voice);
            let config_path = resolve_piper_config(&model_path);
            if !config_path.exists() {
                return Err(SynthesisError::Backend(format!(
                    "Piper config not found at {} (expected from {})",
                    config_path.display(),
                    model_path.display()
                )));
            }
            let model = from_config_path(&config_path)
                .map_err(|err| SynthesisError::Backend(format!("Loading Piper model: {err}")))?;
            let piper = PiperSpeechSynthesizer::new(model).map_err(|err| {
                SynthesisError::Backend(format!("Preparing Piper synthesizer: {err}"))
            })?;

            debug!(chars = text.len(), %voice, "Synthesizing with Piper");
            let mut samples: Vec<f32> = Vec::new();
            let mut sample_rate: Option<u32> = None;
            let mut channels: Option<u16> = None;
            let chunks = piper
                .synthesize_lazy(text.to_string(), None)
                .map_err(|err| SynthesisError::Backend(err.to_string()))?;
            for chunk in chunks {
                let chunk = chunk.map_err(|err| SynthesisError::Backend(err.to_string()))?;
                if sample_rate.is_none() {
                    sample_rate = Some(chunk.info.sample_rate as u32);
                    channels = Some(chunk.info.num_channels as u16);
                }
                samples.extend_from_slice(chunk.samples.as_slice());
            }

            if samples.is_empty() {
                warn!(%voice, "Piper produced no speech");
                return Err(SynthesisError::Empty);
            }
            Ok(AudioBuffer::new(
                samples,
                sample_rate.unwrap_or(22050),
                channels.unwrap_or(1),
            ))
        }
    }
}

/// Log which backend the player will use when no model is compiled in.
#[cfg(not(feature = "piper"))]
pub fn warn_without_piper(model_path: &str) {
    tracing::warn!(
        model = %model_path,
        "Built without the `piper` feature; narration will be silent unless --audio is given"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_narration_scales_with_text() {
        let audio = SilentSynthesizer.synthesize("a".repeat(30).as_str(), "any").unwrap();
        assert!((audio.duration() - 2.0).abs() < 1e-3);
        assert_eq!(
            SilentSynthesizer.synthesize("", "any").unwrap_err(),
            SynthesisError::Empty
        );
    }

    #[test]
    fn voices_map_to_sibling_models() {
        let model = Path::new("/voices/en_US-ryan-high.onnx");
        assert_eq!(model_for_voice(model, "en_US-ryan-high"), model);
        assert_eq!(
            model_for_voice(model, "en_GB-alba-medium"),
            Path::new("/voices/en_GB-alba-medium.onnx")
        );
        assert_eq!(
            resolve_piper_config(model),
            Path::new("/voices/en_US-ryan-high.onnx.json")
        );
    }

    #[test]
    fn espeak_root_drops_data_suffix() {
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share/espeak-ng-data")),
            PathBuf::from("/usr/share")
        );
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share")),
            PathBuf::from("/usr/share")
        );
    }

    #[test]
    fn missing_recording_reports_backend_error() {
        let synth = WavFileSynthesizer::new(PathBuf::from("no/such/narration.wav"));
        assert!(matches!(
            synth.synthesize("text", "voice"),
            Err(SynthesisError::Backend(_))
        ));
    }
}
