//! The seam between the transport and whatever actually makes sound.

use crate::signal::CompletionSignal;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Decoded, interleaved PCM samples.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Silence of the given length; handy for hosts without audio output.
    pub fn silent(seconds: f64, sample_rate: u32) -> Self {
        let frames = (seconds.max(0.0) * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; frames], sample_rate, 1)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    /// Length in seconds at normal speed.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no render is active")]
    Idle,
    #[error("audio output failed: {0}")]
    Output(String),
}

/// Plays an [`AudioBuffer`] from an offset at a given rate.
///
/// `stop` on an idle renderer returns [`RenderError::Idle`]; the transport
/// treats that as a no-op. `done` is resolved when the buffer plays out; a
/// halted render may drop it unresolved.
pub trait AudioRenderer {
    fn start(
        &mut self,
        buffer: &AudioBuffer,
        offset: f64,
        speed: f64,
        done: CompletionSignal,
    ) -> Result<(), RenderError>;

    fn stop(&mut self) -> Result<(), RenderError>;

    fn set_speed(&mut self, speed: f64) -> Result<(), RenderError>;
}

/// Renderer that produces no sound. Playback is tracked by the clock alone.
#[derive(Debug, Default)]
pub struct SilentRenderer {
    active: Option<CompletionSignal>,
}

impl AudioRenderer for SilentRenderer {
    fn start(
        &mut self,
        buffer: &AudioBuffer,
        offset: f64,
        speed: f64,
        done: CompletionSignal,
    ) -> Result<(), RenderError> {
        debug!(
            offset,
            speed,
            duration = buffer.duration(),
            "Starting silent render"
        );
        self.active = Some(done);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RenderError> {
        self.active.take().map(|_| ()).ok_or(RenderError::Idle)
    }

    fn set_speed(&mut self, _speed: f64) -> Result<(), RenderError> {
        if self.active.is_none() {
            return Err(RenderError::Idle);
        }
        Ok(())
    }
}
