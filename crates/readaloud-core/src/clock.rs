//! Virtual playback clock.
//!
//! Position is never read back from the audio device. Instead the clock keeps
//! an anchor `(anchor_time, offset, speed)` and derives the position from how
//! much wall time passed since the anchor was taken. Every transition
//! (start, halt, speed change, seek) re-anchors, so the position stays
//! continuous and only jumps when a seek asks it to.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Clamp a requested playback rate into the supported range.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        DEFAULT_SPEED
    }
}

/// Wall-clock seconds from an arbitrary, fixed origin.
pub trait TimeSource {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven time, shared between clones. Used by tests and by hosts that
/// replay recorded input.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Rc<Cell<f64>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// Virtual position (seconds) valid at `anchor_time`.
    pub offset: f64,
    pub anchor_time: f64,
    pub speed: f64,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: ClockState,
    duration: f64,
    running: bool,
}

impl PlaybackClock {
    pub fn new(speed: f64) -> Self {
        Self {
            state: ClockState {
                offset: 0.0,
                anchor_time: 0.0,
                speed: clamp_speed(speed),
            },
            duration: 0.0,
            running: false,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stored offset; only equals the position while halted.
    pub fn offset(&self) -> f64 {
        self.state.offset
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        self.state.offset = self.clamp(self.state.offset);
    }

    fn clamp(&self, position: f64) -> f64 {
        if position.is_nan() {
            return 0.0;
        }
        position.clamp(0.0, self.duration)
    }

    pub fn position(&self, now: f64) -> f64 {
        if !self.running {
            return self.state.offset;
        }
        let elapsed = (now - self.state.anchor_time) * self.state.speed;
        self.clamp(self.state.offset + elapsed)
    }

    /// Fold elapsed time into the offset and take a fresh anchor at `now`.
    pub fn reanchor(&mut self, now: f64) {
        self.state.offset = self.position(now);
        self.state.anchor_time = now;
    }

    pub fn start(&mut self, now: f64, at: f64) {
        self.state.offset = self.clamp(at);
        self.state.anchor_time = now;
        self.running = true;
    }

    /// Stop advancing. Halting an already halted clock changes nothing.
    pub fn halt(&mut self, now: f64) -> f64 {
        if self.running {
            self.reanchor(now);
            self.running = false;
        }
        self.state.offset
    }

    pub fn set_speed(&mut self, now: f64, speed: f64) {
        if self.running {
            self.reanchor(now);
        }
        self.state.speed = clamp_speed(speed);
    }

    /// Jump to `at` without changing whether the clock runs.
    pub fn set_offset(&mut self, now: f64, at: f64) {
        self.state.offset = self.clamp(at);
        self.state.anchor_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(duration: f64) -> PlaybackClock {
        let mut clock = PlaybackClock::new(1.0);
        clock.set_duration(duration);
        clock
    }

    #[test]
    fn position_follows_wall_time_and_speed() {
        let mut clock = clock(10.0);
        clock.start(100.0, 2.0);
        assert!((clock.position(101.5) - 3.5).abs() < 1e-9);
        clock.set_speed(101.5, 2.0);
        assert!((clock.position(102.5) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn speed_change_keeps_position_continuous() {
        let mut clock = clock(10.0);
        clock.start(0.0, 1.0);
        let before = clock.position(3.25);
        clock.set_speed(3.25, 1.5);
        let after = clock.position(3.25);
        assert!((before - after).abs() < 1e-12);
        assert_eq!(clock.state().anchor_time, 3.25);
    }

    #[test]
    fn halting_twice_matches_halting_once() {
        let mut clock = clock(10.0);
        clock.start(0.0, 0.0);
        let first = clock.halt(2.0);
        let second = clock.halt(5.0);
        assert_eq!(first, second);
        assert_eq!(clock.position(9.0), 2.0);
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let mut clock = clock(4.0);
        clock.start(0.0, 3.0);
        assert_eq!(clock.position(10.0), 4.0);
        assert_eq!(clock.halt(10.0), 4.0);
        clock.set_offset(10.0, -3.0);
        assert_eq!(clock.offset(), 0.0);
    }

    #[test]
    fn speed_is_clamped() {
        assert_eq!(clamp_speed(10.0), MAX_SPEED);
        assert_eq!(clamp_speed(0.0), MIN_SPEED);
        assert_eq!(clamp_speed(f64::NAN), DEFAULT_SPEED);
    }

    #[test]
    fn manual_time_is_shared_between_clones() {
        let time = ManualTime::new();
        let view = time.clone();
        time.advance(1.5);
        time.advance(0.5);
        assert_eq!(view.now(), 2.0);
    }
}
