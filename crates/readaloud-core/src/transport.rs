//! Playback transport: owns the clock, the renderer and the loaded audio.
//!
//! Every operation reads wall time once, applies the clock math, and only then
//! talks to the renderer. Renderer failures on idempotent calls (stopping a
//! render that already ended, say) are logged and swallowed.

use crate::clock::{PlaybackClock, TimeSource};
use crate::render::{AudioBuffer, AudioRenderer, RenderError};
use crate::signal::RenderCompletion;
use serde::Serialize;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransportState {
    Stopped,
    /// Waiting for the synthesizer.
    Generating,
    Playing,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("audio is still being generated")]
    Busy,
    #[error("no audio is loaded")]
    NoAudio,
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Moved { position: f64 },
    /// The seek landed on the end while playing; playback has finished.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
    /// No audio yet; the caller must run synthesis for `request_id`.
    Generating { request_id: u64 },
}

pub struct Transport {
    renderer: Box<dyn AudioRenderer>,
    time: Rc<dyn TimeSource>,
    clock: PlaybackClock,
    buffer: Option<AudioBuffer>,
    state: TransportState,
    completion: Option<RenderCompletion>,
    request_id: u64,
}

impl Transport {
    pub fn new(renderer: Box<dyn AudioRenderer>, time: Rc<dyn TimeSource>, speed: f64) -> Self {
        Self {
            renderer,
            time,
            clock: PlaybackClock::new(speed),
            buffer: None,
            state: TransportState::Stopped,
            completion: None,
            request_id: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_generating(&self) -> bool {
        self.state == TransportState::Generating
    }

    pub fn buffer(&self) -> Option<&AudioBuffer> {
        self.buffer.as_ref()
    }

    pub fn has_audio(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn now(&self) -> f64 {
        self.time.now()
    }

    /// Current virtual position, read fresh from the clock.
    pub fn position(&self) -> f64 {
        self.clock.position(self.time.now())
    }

    /// Install freshly synthesized audio with the playhead at zero.
    pub fn load(&mut self, buffer: AudioBuffer) {
        self.halt_render();
        self.completion = None;
        let now = self.time.now();
        self.clock.halt(now);
        self.clock.set_duration(buffer.duration());
        self.clock.set_offset(now, 0.0);
        info!(duration = buffer.duration(), "Loaded synthesized audio");
        self.buffer = Some(buffer);
    }

    /// Drop the loaded audio and any pending synthesis request.
    pub fn clear_audio(&mut self) {
        self.stop();
        self.cancel_generating();
        let now = self.time.now();
        self.buffer = None;
        self.clock.set_duration(0.0);
        self.clock.set_offset(now, 0.0);
    }

    fn halt_render(&mut self) {
        if let Err(err) = self.renderer.stop() {
            debug!("Ignoring renderer stop failure: {err}");
        }
    }

    /// Start rendering at `at`. Offsets at or past the end restart from zero.
    pub fn start(&mut self, at: f64) -> Result<(), TransportError> {
        if self.buffer.is_none() {
            return Err(TransportError::NoAudio);
        }
        self.halt_render();

        let duration = self.clock.duration();
        let at = if at.is_finite() && at < duration {
            at.max(0.0)
        } else {
            0.0
        };
        let speed = self.clock.speed();
        let (signal, completion) = RenderCompletion::pair();
        let started = match self.buffer.as_ref() {
            Some(buffer) => self.renderer.start(buffer, at, speed, signal),
            None => return Err(TransportError::NoAudio),
        };
        if let Err(err) = started {
            warn!(offset = at, "Failed to start render: {err}");
            let now = self.time.now();
            self.clock.halt(now);
            self.clock.set_offset(now, at);
            self.state = TransportState::Stopped;
            self.completion = None;
            return Err(err.into());
        }

        self.clock.start(self.time.now(), at);
        self.completion = Some(completion);
        self.state = TransportState::Playing;
        debug!(offset = at, speed, "Playback started");
        Ok(())
    }

    /// Pause, folding elapsed time into the stored offset. Calling this when
    /// not playing changes nothing.
    pub fn stop(&mut self) -> f64 {
        if self.state != TransportState::Playing {
            return self.clock.offset();
        }
        self.halt_render();
        let offset = self.clock.halt(self.time.now());
        self.completion = None;
        self.state = TransportState::Stopped;
        debug!(offset, "Playback stopped");
        offset
    }

    /// Stop and rewind after the end of the audio was reached.
    pub fn finish(&mut self) {
        self.stop();
        let now = self.time.now();
        self.clock.set_offset(now, 0.0);
        info!("Playback finished");
    }

    pub fn toggle(&mut self) -> Result<ToggleOutcome, TransportError> {
        match self.state {
            TransportState::Generating => Err(TransportError::Busy),
            TransportState::Playing => {
                self.stop();
                Ok(ToggleOutcome::Stopped)
            }
            TransportState::Stopped if self.buffer.is_some() => {
                self.start(self.clock.offset())?;
                Ok(ToggleOutcome::Started)
            }
            TransportState::Stopped => {
                self.request_id = self.request_id.wrapping_add(1);
                self.state = TransportState::Generating;
                info!(request_id = self.request_id, "Requesting speech synthesis");
                Ok(ToggleOutcome::Generating {
                    request_id: self.request_id,
                })
            }
        }
    }

    /// Whether a synthesis result for `request_id` is still wanted.
    pub fn awaits(&self, request_id: u64) -> bool {
        self.state == TransportState::Generating && self.request_id == request_id
    }

    /// Leave `Generating` without audio, invalidating the outstanding request.
    pub fn cancel_generating(&mut self) {
        if self.state == TransportState::Generating {
            self.state = TransportState::Stopped;
        }
        self.request_id = self.request_id.wrapping_add(1);
    }

    pub fn change_speed(&mut self, speed: f64) -> Result<(), TransportError> {
        if self.state == TransportState::Generating {
            return Err(TransportError::Busy);
        }
        let now = self.time.now();
        self.clock.set_speed(now, speed);
        let applied = self.clock.speed();
        if self.state == TransportState::Playing {
            if let Err(err) = self.renderer.set_speed(applied) {
                warn!(speed = applied, "Failed to apply speed to active render: {err}");
            }
        }
        debug!(speed = applied, playing = self.is_playing(), "Speed changed");
        Ok(())
    }

    pub fn seek(&mut self, delta: f64) -> Result<SeekOutcome, TransportError> {
        if self.state == TransportState::Generating {
            return Err(TransportError::Busy);
        }
        if self.buffer.is_none() {
            return Err(TransportError::NoAudio);
        }

        let now = self.time.now();
        let duration = self.clock.duration();
        let target = (self.clock.position(now) + delta).clamp(0.0, duration);
        debug!(delta, target, "Seeking");

        if self.state == TransportState::Playing {
            if target >= duration {
                self.finish();
                return Ok(SeekOutcome::Finished);
            }
            self.start(target)?;
        } else {
            self.clock.set_offset(now, target);
        }
        Ok(SeekOutcome::Moved { position: target })
    }

    /// Consume the renderer's completion notification, if it fired.
    pub fn take_render_finished(&mut self) -> bool {
        self.completion
            .as_ref()
            .map(RenderCompletion::take)
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualTime;
    use crate::signal::CompletionSignal;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Start { offset: f64, speed: f64 },
        Stop,
        SetSpeed(f64),
    }

    /// Records renderer calls and can fire the last completion signal.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingRenderer {
        pub(crate) calls: Rc<RefCell<Vec<Call>>>,
        pending: Rc<RefCell<Option<CompletionSignal>>>,
        failing: Rc<Cell<bool>>,
    }

    impl RecordingRenderer {
        /// Make every later `start` fail as if the output device vanished.
        pub(crate) fn fail_starts(&self, failing: bool) {
            self.failing.set(failing);
        }

        pub(crate) fn finish_render(&self) {
            if let Some(signal) = self.pending.borrow_mut().take() {
                signal.resolve();
            }
        }

        pub(crate) fn starts(&self) -> Vec<f64> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    Call::Start { offset, .. } => Some(*offset),
                    _ => None,
                })
                .collect()
        }
    }

    impl AudioRenderer for RecordingRenderer {
        fn start(
            &mut self,
            _buffer: &AudioBuffer,
            offset: f64,
            speed: f64,
            done: CompletionSignal,
        ) -> Result<(), RenderError> {
            self.calls.borrow_mut().push(Call::Start { offset, speed });
            if self.failing.get() {
                return Err(RenderError::Output("device unplugged".to_string()));
            }
            *self.pending.borrow_mut() = Some(done);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), RenderError> {
            self.calls.borrow_mut().push(Call::Stop);
            self.pending
                .borrow_mut()
                .take()
                .map(|_| ())
                .ok_or(RenderError::Idle)
        }

        fn set_speed(&mut self, speed: f64) -> Result<(), RenderError> {
            self.calls.borrow_mut().push(Call::SetSpeed(speed));
            Ok(())
        }
    }

    fn transport_with(seconds: f64) -> (Transport, ManualTime, RecordingRenderer) {
        let time = ManualTime::new();
        let renderer = RecordingRenderer::default();
        let mut transport = Transport::new(Box::new(renderer.clone()), Rc::new(time.clone()), 1.0);
        transport.load(AudioBuffer::silent(seconds, 100));
        (transport, time, renderer)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut transport, time, _) = transport_with(10.0);
        transport.start(0.0).unwrap();
        time.advance(2.0);
        let first = transport.stop();
        time.advance(3.0);
        let second = transport.stop();
        assert!(approx(first, 2.0));
        assert_eq!(first, second);
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn resume_continues_from_stored_offset() {
        let (mut transport, time, renderer) = transport_with(10.0);
        transport.toggle().unwrap();
        time.advance(1.5);
        assert_eq!(transport.toggle().unwrap(), ToggleOutcome::Stopped);
        time.advance(4.0);
        assert_eq!(transport.toggle().unwrap(), ToggleOutcome::Started);
        assert_eq!(renderer.starts(), vec![0.0, 1.5]);
        time.advance(0.5);
        assert!(approx(transport.position(), 2.0));
    }

    #[test]
    fn speed_change_preserves_position() {
        let (mut transport, time, renderer) = transport_with(10.0);
        transport.start(0.0).unwrap();
        time.advance(2.0);
        let before = transport.position();
        transport.change_speed(1.5).unwrap();
        let after = transport.position();
        assert!(approx(before, after));
        time.advance(2.0);
        assert!(approx(transport.position(), 5.0));
        assert!(renderer.calls.borrow().contains(&Call::SetSpeed(1.5)));
        // No restart: speed changes never re-issue a start.
        assert_eq!(renderer.starts().len(), 1);
    }

    #[test]
    fn speed_change_while_stopped_applies_on_next_start() {
        let (mut transport, _time, renderer) = transport_with(10.0);
        transport.change_speed(0.75).unwrap();
        transport.start(0.0).unwrap();
        assert_eq!(
            renderer.calls.borrow().last(),
            Some(&Call::Start {
                offset: 0.0,
                speed: 0.75
            })
        );
    }

    #[test]
    fn seek_there_and_back_returns_to_start() {
        let (mut transport, time, _) = transport_with(20.0);
        transport.start(4.0).unwrap();
        time.advance(1.0);
        let origin = transport.position();
        transport.seek(3.0).unwrap();
        transport.seek(-3.0).unwrap();
        assert!(approx(transport.position(), origin));
    }

    #[test]
    fn seek_while_stopped_only_moves_offset() {
        let (mut transport, _time, renderer) = transport_with(10.0);
        assert_eq!(
            transport.seek(-5.0).unwrap(),
            SeekOutcome::Moved { position: 0.0 }
        );
        assert_eq!(
            transport.seek(25.0).unwrap(),
            SeekOutcome::Moved { position: 10.0 }
        );
        assert!(renderer.starts().is_empty());
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn seek_past_end_while_playing_finishes() {
        let (mut transport, time, _) = transport_with(10.0);
        transport.start(0.0).unwrap();
        time.advance(8.0);
        assert_eq!(transport.seek(5.0).unwrap(), SeekOutcome::Finished);
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.position(), 0.0);
    }

    #[test]
    fn start_past_end_restarts_from_zero() {
        let (mut transport, _time, renderer) = transport_with(3.0);
        transport.start(3.0).unwrap();
        transport.start(-1.0).unwrap();
        assert_eq!(renderer.starts(), vec![0.0, 0.0]);
    }

    #[test]
    fn generating_blocks_reentry() {
        let time = ManualTime::new();
        let mut transport = Transport::new(
            Box::new(RecordingRenderer::default()),
            Rc::new(time.clone()),
            1.0,
        );
        let ToggleOutcome::Generating { request_id } = transport.toggle().unwrap() else {
            panic!("expected a synthesis request");
        };
        assert!(transport.awaits(request_id));
        assert!(matches!(transport.toggle(), Err(TransportError::Busy)));
        assert!(matches!(transport.seek(1.0), Err(TransportError::Busy)));
        assert!(matches!(
            transport.change_speed(2.0),
            Err(TransportError::Busy)
        ));
        transport.cancel_generating();
        assert!(!transport.awaits(request_id));
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn seek_without_audio_is_rejected() {
        let mut transport = Transport::new(
            Box::new(RecordingRenderer::default()),
            Rc::new(ManualTime::new()),
            1.0,
        );
        assert!(matches!(transport.seek(1.0), Err(TransportError::NoAudio)));
    }

    #[test]
    fn failed_start_keeps_the_requested_offset() {
        let (mut transport, time, renderer) = transport_with(10.0);
        transport.start(0.0).unwrap();
        time.advance(2.0);
        renderer.fail_starts(true);
        assert!(matches!(
            transport.seek(3.0),
            Err(TransportError::Render(RenderError::Output(_)))
        ));
        assert_eq!(transport.state(), TransportState::Stopped);
        assert!(!transport.clock().is_running());
        assert!(approx(transport.clock().offset(), 5.0));
        time.advance(4.0);
        assert!(approx(transport.position(), 5.0));
        assert!(!transport.take_render_finished());
    }

    #[test]
    fn render_completion_is_consumed_once() {
        let (mut transport, _time, renderer) = transport_with(3.0);
        transport.start(0.0).unwrap();
        assert!(!transport.take_render_finished());
        renderer.finish_render();
        assert!(transport.take_render_finished());
        assert!(!transport.take_render_finished());
    }
}
