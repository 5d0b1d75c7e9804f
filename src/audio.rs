//! Audio output through `rodio`.

use readaloud_core::{AudioBuffer, AudioRenderer, CompletionSignal, RenderError};
use rodio::source::EmptyCallback;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Plays buffers on the default output device. Each start builds a fresh
/// sink so a stopped render can never resume behind the transport's back.
pub struct RodioRenderer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioRenderer {
    pub fn try_default() -> Result<Self, RenderError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| RenderError::Output(format!("Opening audio output: {err}")))?;
        info!("Opened default audio output");
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

/// Plays an [`AudioBuffer`]'s samples in place, starting at a frame offset.
struct SharedSource {
    samples: Arc<[f32]>,
    position: usize,
    sample_rate: u32,
    channels: u16,
}

impl SharedSource {
    fn from_offset(buffer: &AudioBuffer, offset: f64) -> Self {
        let channels = buffer.channels().max(1);
        let frame = (offset.max(0.0) * f64::from(buffer.sample_rate())) as usize;
        let samples = buffer.shared_samples();
        let position = frame
            .saturating_mul(usize::from(channels))
            .min(samples.len());
        Self {
            samples,
            position,
            sample_rate: buffer.sample_rate(),
            channels,
        }
    }

    fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl Iterator for SharedSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl Source for SharedSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.remaining())
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() / usize::from(self.channels);
        Some(Duration::from_secs_f64(
            frames as f64 / f64::from(self.sample_rate.max(1)),
        ))
    }
}

impl AudioRenderer for RodioRenderer {
    fn start(
        &mut self,
        buffer: &AudioBuffer,
        offset: f64,
        speed: f64,
        done: CompletionSignal,
    ) -> Result<(), RenderError> {
        if let Some(previous) = self.sink.take() {
            previous.stop();
        }
        let sink = Sink::try_new(&self.handle)
            .map_err(|err| RenderError::Output(format!("Creating sink: {err}")))?;

        let source = SharedSource::from_offset(buffer, offset);
        let done = Mutex::new(Some(done));
        let on_end = EmptyCallback::<f32>::new(Box::new(move || {
            if let Some(signal) = done.lock().ok().and_then(|mut slot| slot.take()) {
                signal.resolve();
            }
        }));

        sink.set_speed(speed as f32);
        sink.append(source);
        sink.append(on_end);
        sink.play();
        debug!(offset, speed, "Started rodio render");
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RenderError> {
        let sink = self.sink.take().ok_or(RenderError::Idle)?;
        sink.stop();
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<(), RenderError> {
        let sink = self.sink.as_ref().ok_or(RenderError::Idle)?;
        sink.set_speed(speed as f32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_starts_at_the_offset_frame() {
        let buffer = AudioBuffer::new((0..8).map(|n| n as f32).collect(), 2, 2);
        let source = SharedSource::from_offset(&buffer, 1.0);
        assert_eq!(source.current_frame_len(), Some(4));
        assert_eq!(source.collect::<Vec<_>>(), vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn source_past_the_end_is_empty() {
        let buffer = AudioBuffer::silent(1.0, 10);
        let mut source = SharedSource::from_offset(&buffer, 5.0);
        assert_eq!(source.next(), None);
        assert_eq!(source.total_duration(), Some(Duration::from_secs(1)));
    }
}
