//! Per-frame highlight loop.
//!
//! The loop is a chain of [`FrameTicket`]s: at most one ticket is scheduled
//! at a time, the host hands it back on the next display refresh, and each
//! accepted tick schedules its successor. Cancelling the loop invalidates
//! every outstanding ticket, so a tick that was already in flight when
//! playback stopped cannot bring highlight state back.

use crate::signal::CancellationToken;
use crate::tokenizer::{Token, active_token_at};
use tracing::trace;

/// Permission to run one tick of a specific loop run.
#[derive(Debug, Clone)]
pub struct FrameTicket {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The ticket belongs to a cancelled or superseded run.
    Stale,
    /// Playback reached the end. The loop has cancelled itself; the caller
    /// stops the transport and clears the active token.
    Finished,
    /// Still playing. `changed` holds the new active token when it moved.
    Continue { changed: Option<Option<usize>> },
}

#[derive(Debug, Default)]
pub struct SyncLoop {
    generation: u64,
    run: Option<CancellationToken>,
    scheduled: Option<FrameTicket>,
    active_token: Option<usize>,
}

impl SyncLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh run, superseding any previous one.
    pub fn start(&mut self) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let token = CancellationToken::new();
        self.scheduled = Some(FrameTicket {
            generation: self.generation,
            cancel: token.clone(),
        });
        self.run = Some(token);
        trace!(generation = self.generation, "Sync loop started");
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.run.take() {
            token.cancel();
            trace!(generation = self.generation, "Sync loop cancelled");
        }
        self.scheduled = None;
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Hand the next scheduled tick to the frame driver.
    pub fn take_scheduled(&mut self) -> Option<FrameTicket> {
        self.scheduled.take()
    }

    pub fn accepts(&self, ticket: &FrameTicket) -> bool {
        self.run.is_some()
            && ticket.generation == self.generation
            && !ticket.cancel.is_cancelled()
    }

    pub fn active_token(&self) -> Option<usize> {
        self.active_token
    }

    /// Record the active token; returns whether it changed.
    pub fn set_active(&mut self, token: Option<usize>) -> bool {
        if self.active_token == token {
            return false;
        }
        self.active_token = token;
        true
    }

    /// Evaluate one frame. `position` and `duration` must be read fresh for
    /// this frame; `render_finished` reports the audio engine's completion.
    pub fn tick(
        &mut self,
        ticket: FrameTicket,
        position: f64,
        duration: f64,
        tokens: &[Token],
        render_finished: bool,
    ) -> TickOutcome {
        if !self.accepts(&ticket) {
            trace!(generation = ticket.generation, "Dropping stale frame");
            return TickOutcome::Stale;
        }

        if render_finished || position >= duration {
            self.cancel();
            return TickOutcome::Finished;
        }

        let next = active_token_at(tokens, position).map(|token| token.id);
        let changed = self.set_active(next).then_some(next);
        self.scheduled = Some(ticket);
        TickOutcome::Continue { changed }
    }
}
