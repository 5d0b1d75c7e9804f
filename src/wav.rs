//! WAV encoding for the synthesis cache and audio export.

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use readaloud_core::AudioBuffer;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Decode a WAV file into normalized `f32` samples.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Opening WAV {}", path.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Decoding float samples")?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Decoding integer samples")?
        }
    };
    if spec.channels == 0 || spec.sample_rate == 0 {
        bail!("WAV {} has an empty format", path.display());
    }
    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "Decoded WAV"
    );
    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Encode as 16-bit PCM. The file is written to a temporary sibling first and
/// renamed into place, so readers never observe a partial file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating directory {}", parent.display()))?;
    }

    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let temp_path = unique_temp_wav_path(path);
    let mut writer = WavWriter::create(&temp_path, spec)
        .with_context(|| format!("Creating WAV {}", temp_path.display()))?;
    for &s in buffer.samples() {
        let clamped = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(clamped)?;
    }
    writer.finalize()?;
    if fs::rename(&temp_path, path).is_err() {
        fs::copy(&temp_path, path)
            .with_context(|| format!("Copying WAV into {}", path.display()))?;
        let _ = fs::remove_file(&temp_path);
    }
    debug!(path = %path.display(), duration = buffer.duration(), "Wrote WAV");
    Ok(())
}

fn unique_temp_wav_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut temp_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("audio.wav")
        .to_string();
    temp_name.push_str(&format!(".tmp-{ts_nanos}-{nonce}"));
    path.with_file_name(temp_name)
}
