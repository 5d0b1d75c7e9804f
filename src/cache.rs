//! Disk cache for synthesized speech.
//!
//! Files are stored under `<cache_dir>/tts/` using a hash of the model, voice
//! and spoken text as the filename, so identical requests reuse audio across
//! runs. Entries are plain WAV files.

use crate::wav::{read_wav, write_wav};
use readaloud_core::{AudioBuffer, SpeechSynthesizer, SynthesisError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub fn tts_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("tts")
}

pub fn cache_path(cache_root: &Path, model_key: &str, voice: &str, text: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    tts_dir(cache_root).join(format!("tts-{hash}.wav"))
}

/// Serves repeated requests from disk and records fresh audio for next time.
/// Cache failures are logged; they never fail a synthesis that succeeded.
pub struct CachedSynthesizer<S> {
    inner: S,
    cache_root: PathBuf,
    model_key: String,
}

impl<S: SpeechSynthesizer> CachedSynthesizer<S> {
    pub fn new(inner: S, cache_root: PathBuf, model_key: impl Into<String>) -> Self {
        Self {
            inner,
            cache_root,
            model_key: model_key.into(),
        }
    }
}

impl<S: SpeechSynthesizer> SpeechSynthesizer for CachedSynthesizer<S> {
    fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, SynthesisError> {
        let path = cache_path(&self.cache_root, &self.model_key, voice, text);
        if path.exists() {
            match read_wav(&path) {
                Ok(buffer) => {
                    info!(path = %path.display(), "Using cached speech");
                    return Ok(buffer);
                }
                Err(err) => warn!(path = %path.display(), "Discarding unreadable cache entry: {err:#}"),
            }
        }

        let buffer = self.inner.synthesize(text, voice)?;
        if let Err(err) = write_wav(&path, &buffer) {
            warn!(path = %path.display(), "Failed to cache speech: {err:#}");
        } else {
            debug!(path = %path.display(), "Cached synthesized speech");
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSynthesizer {
        calls: AtomicUsize,
    }

    impl SpeechSynthesizer for CountingSynthesizer {
        fn synthesize(&self, text: &str, _voice: &str) -> Result<AudioBuffer, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AudioBuffer::silent(text.len() as f64 / 10.0, 1_000))
        }
    }

    #[test]
    fn cache_key_depends_on_voice_and_text() {
        let root = Path::new(".cache");
        let base = cache_path(root, "model", "ryan", "Hello");
        assert_eq!(base, cache_path(root, "model", "ryan", "Hello"));
        assert_ne!(base, cache_path(root, "model", "alba", "Hello"));
        assert_ne!(base, cache_path(root, "model", "ryan", "Hello!"));
        assert_eq!(base.parent(), Some(Path::new(".cache/tts")));
        let name = base.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("tts-"));
        assert_eq!(name.len(), "tts-".len() + 64 + ".wav".len());
        assert_eq!(base.extension().and_then(|e| e.to_str()), Some("wav"));
    }

    #[test]
    fn second_request_is_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cached =
            CachedSynthesizer::new(CountingSynthesizer::default(), dir.path().to_path_buf(), "m");
        let first = cached.synthesize("Hello there", "ryan").unwrap();
        let second = cached.synthesize("Hello there", "ryan").unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert!((first.duration() - second.duration()).abs() < 1e-9);

        cached.synthesize("Hello there", "alba").unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
