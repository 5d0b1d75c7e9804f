use crate::clock::{DEFAULT_SPEED, TimeSource, clamp_speed};
use crate::pagination::{DEFAULT_PAGE_BUDGET_CHARS, Page, PageTurn, PageView, repaginate};
use crate::render::{AudioBuffer, AudioRenderer};
use crate::services::{QuizQuestion, SimplificationError, SimplificationResult, SynthesisError};
use crate::sync_loop::{FrameTicket, SyncLoop, TickOutcome};
use crate::tokenizer::{
    Segment, Token, TokenizeError, active_token_at, spoken_text, static_segments, tokenize,
    tokens_in_range, validate_markup,
};
use crate::transport::{SeekOutcome, ToggleOutcome, Transport, TransportError, TransportState};
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};
use ts_rs::TS;

pub const DEFAULT_SEEK_STEP_SECS: f64 = 5.0;
pub const DEFAULT_VOICE: &str = "en_US-ryan-high";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub page_budget_chars: usize,
    /// Seek distance used when paging past either end of the text.
    pub seek_step_secs: f64,
    pub speed: f64,
    pub voice: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            page_budget_chars: DEFAULT_PAGE_BUDGET_CHARS,
            seek_step_secs: DEFAULT_SEEK_STEP_SECS,
            speed: DEFAULT_SPEED,
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

/// Status reported to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransportStatus {
    Idle,
    Generating,
    Playing,
    Stopped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ReaderEvent {
    ActiveTokenChanged { token: Option<usize> },
    PageChanged { page: usize },
    StatusChanged { status: TransportStatus },
    /// The audio played out (or a seek ran past its end) and rewound to zero.
    PlaybackFinished,
    Error { message: String },
}

/// Work the host must perform off the session thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub request_id: u64,
    /// Text with term markup removed.
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ReaderSnapshot {
    pub status: TransportStatus,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub speed: f64,
    pub voice: String,
    pub current_page: usize,
    pub total_pages: usize,
    pub page_text: String,
    pub active_token: Option<usize>,
    pub active_word: Option<String>,
    pub has_timing: bool,
    pub summary: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    TogglePlayback,
    Stop,
    Seek { delta_secs: f64 },
    ChangeSpeed { speed: f64 },
    NextPage,
    PrevPage,
    SetPage { page: usize },
    SetVoice { voice: String },
    Clear,
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::TogglePlayback => "reader_toggle_playback",
            Self::Stop => "reader_stop",
            Self::Seek { .. } => "reader_seek",
            Self::ChangeSpeed { .. } => "reader_change_speed",
            Self::NextPage => "reader_next_page",
            Self::PrevPage => "reader_prev_page",
            Self::SetPage { .. } => "reader_set_page",
            Self::SetVoice { .. } => "reader_set_voice",
            Self::Clear => "reader_clear",
        }
    }
}

/// Owns the text, its tokens and pages, the transport and the sync loop.
///
/// Everything is mutated on one thread through the methods below; the only
/// asynchronous edge is synthesis, which the host runs and reports back via
/// [`ReaderSession::resolve_synthesis`]. Notifications accumulate in an
/// outbox drained with [`ReaderSession::drain_events`].
pub struct ReaderSession {
    settings: SessionSettings,
    text: String,
    summary: String,
    quiz: Vec<QuizQuestion>,
    tokens: Vec<Token>,
    pages: PageView,
    transport: Transport,
    sync: SyncLoop,
    status: TransportStatus,
    last_error: Option<String>,
    events: Vec<ReaderEvent>,
}

impl ReaderSession {
    pub fn new(
        renderer: Box<dyn AudioRenderer>,
        time: Rc<dyn TimeSource>,
        mut settings: SessionSettings,
    ) -> Self {
        settings.speed = clamp_speed(settings.speed);
        let transport = Transport::new(renderer, time, settings.speed);
        Self {
            settings,
            text: String::new(),
            summary: String::new(),
            quiz: Vec::new(),
            tokens: Vec::new(),
            pages: PageView::default(),
            transport,
            sync: SyncLoop::new(),
            status: TransportStatus::Idle,
            last_error: None,
            events: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn quiz(&self) -> &[QuizQuestion] {
        &self.quiz
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn pages(&self) -> &[Page] {
        self.pages.pages()
    }

    pub fn current_page(&self) -> usize {
        self.pages.current()
    }

    pub fn active_token(&self) -> Option<usize> {
        self.sync.active_token()
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn position(&self) -> f64 {
        self.transport.position()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn speed(&self) -> f64 {
        self.transport.speed()
    }

    pub fn voice(&self) -> &str {
        &self.settings.voice
    }

    pub fn audio(&self) -> Option<&AudioBuffer> {
        self.transport.buffer()
    }

    pub fn drain_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replace the text being read. Playback, audio and tokens are discarded
    /// and the view returns to the first page. Invalid term markup is rejected
    /// before anything changes.
    pub fn load_text(&mut self, text: impl Into<String>) -> Result<(), TokenizeError> {
        let text = text.into();
        validate_markup(&text)?;
        self.reset_playback();
        self.pages
            .reset(repaginate(&text, self.settings.page_budget_chars));
        info!(
            chars = text.chars().count(),
            pages = self.pages.len(),
            "Loaded reading text"
        );
        self.text = text;
        self.summary.clear();
        self.quiz.clear();
        self.last_error = None;
        if !self.pages.is_empty() {
            self.events.push(ReaderEvent::PageChanged { page: 0 });
        }
        self.refresh_status();
        Ok(())
    }

    pub fn apply_simplification(
        &mut self,
        result: SimplificationResult,
    ) -> Result<(), SimplificationError> {
        let result = result.validated()?;
        self.load_text(result.simplified_text)?;
        self.summary = result.summary;
        self.quiz = result.quiz;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.reset_playback();
        self.pages.reset(Vec::new());
        self.text.clear();
        self.summary.clear();
        self.quiz.clear();
        self.last_error = None;
        self.refresh_status();
    }

    fn reset_playback(&mut self) {
        self.sync.cancel();
        self.transport.clear_audio();
        self.tokens.clear();
        self.set_active_token(None);
    }

    /// Switching voices invalidates the synthesized audio and its timing.
    pub fn set_voice(&mut self, voice: impl Into<String>) {
        let voice = voice.into();
        if voice == self.settings.voice {
            return;
        }
        info!(%voice, "Voice changed; discarding synthesized audio");
        self.reset_playback();
        self.settings.voice = voice;
        self.last_error = None;
        self.refresh_status();
    }

    /// Play or pause. Returns a synthesis request when audio must be
    /// generated first.
    pub fn toggle(&mut self) -> Option<SynthesisRequest> {
        let spoken = spoken_text(&self.text);
        if spoken.trim().is_empty() {
            debug!("Nothing to read; ignoring toggle");
            return None;
        }
        if !self.transport.is_generating() {
            self.last_error = None;
        }

        let request = match self.transport.toggle() {
            Ok(ToggleOutcome::Started) => {
                self.sync.start();
                None
            }
            Ok(ToggleOutcome::Stopped) => {
                self.sync.cancel();
                None
            }
            Ok(ToggleOutcome::Generating { request_id }) => Some(SynthesisRequest {
                request_id,
                text: spoken,
                voice: self.settings.voice.clone(),
            }),
            Err(err) => {
                self.handle_transport_error(err);
                None
            }
        };
        self.refresh_status();
        request
    }

    /// Feed back the outcome of a [`SynthesisRequest`]. Results for requests
    /// that were superseded (text or voice changed meanwhile) are dropped.
    pub fn resolve_synthesis(
        &mut self,
        request_id: u64,
        result: Result<AudioBuffer, SynthesisError>,
    ) {
        if !self.transport.awaits(request_id) {
            debug!(request_id, "Ignoring stale synthesis result");
            return;
        }

        match result {
            Ok(buffer) => {
                let duration = buffer.duration();
                let tokens = tokenize(&self.text, duration).unwrap_or_else(|err| {
                    warn!("Tokenizing failed; using static highlighting: {err}");
                    Vec::new()
                });
                if tokens.is_empty() {
                    warn!(duration, "No timed tokens; word highlighting disabled");
                }
                info!(
                    request_id,
                    duration,
                    tokens = tokens.len(),
                    "Synthesis resolved"
                );
                self.transport.load(buffer);
                self.tokens = tokens;
                match self.transport.start(0.0) {
                    Ok(()) => self.sync.start(),
                    Err(err) => self.handle_transport_error(err),
                }
            }
            Err(err) => {
                warn!(request_id, "Speech synthesis failed: {err}");
                self.transport.cancel_generating();
                self.report_error(format!("Failed to generate audio: {err}"));
            }
        }
        self.refresh_status();
    }

    /// Pause playback and the highlight loop together.
    pub fn stop(&mut self) {
        self.transport.stop();
        self.sync.cancel();
        self.refresh_status();
    }

    pub fn seek(&mut self, delta_secs: f64) {
        match self.transport.seek(delta_secs) {
            Ok(SeekOutcome::Moved { position }) => {
                let token = active_token_at(&self.tokens, position).map(|token| token.id);
                self.set_active_token(token);
            }
            Ok(SeekOutcome::Finished) => self.finish_playback(),
            Err(err) => self.handle_transport_error(err),
        }
        self.refresh_status();
    }

    pub fn change_speed(&mut self, speed: f64) {
        match self.transport.change_speed(speed) {
            Ok(()) => self.settings.speed = self.transport.speed(),
            Err(err) => self.handle_transport_error(err),
        }
    }

    /// Next page, or a forward seek when already on the last one.
    pub fn next_page(&mut self) {
        match self.pages.next() {
            PageTurn::Moved(page) => self.events.push(ReaderEvent::PageChanged { page }),
            _ => self.seek(self.settings.seek_step_secs),
        }
    }

    /// Previous page, or a backward seek when already on the first one.
    pub fn prev_page(&mut self) {
        match self.pages.prev() {
            PageTurn::Moved(page) => self.events.push(ReaderEvent::PageChanged { page }),
            _ => self.seek(-self.settings.seek_step_secs),
        }
    }

    pub fn set_page(&mut self, page: usize) {
        if let Some(page) = self.pages.set_page(page) {
            self.events.push(ReaderEvent::PageChanged { page });
        }
    }

    /// The next highlight tick for the frame driver, if one is scheduled.
    pub fn take_scheduled_frame(&mut self) -> Option<FrameTicket> {
        self.sync.take_scheduled()
    }

    /// Run one display-refresh tick of the highlight loop.
    pub fn on_frame(&mut self, ticket: FrameTicket) {
        if !self.sync.accepts(&ticket) {
            trace!("Ignoring frame for a cancelled sync loop");
            return;
        }
        if !self.transport.is_playing() {
            self.sync.cancel();
            return;
        }

        let finished = self.transport.take_render_finished();
        let position = self.transport.position();
        let duration = self.transport.duration();
        match self
            .sync
            .tick(ticket, position, duration, &self.tokens, finished)
        {
            TickOutcome::Stale | TickOutcome::Continue { changed: None } => {}
            TickOutcome::Continue {
                changed: Some(token),
            } => self.announce_active_token(token),
            TickOutcome::Finished => {
                self.finish_playback();
                self.refresh_status();
            }
        }
    }

    pub fn apply_command(&mut self, command: SessionCommand) -> Option<SynthesisRequest> {
        debug!(action = command.action(), "Applying session command");
        match command {
            SessionCommand::TogglePlayback => return self.toggle(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::Seek { delta_secs } => self.seek(delta_secs),
            SessionCommand::ChangeSpeed { speed } => self.change_speed(speed),
            SessionCommand::NextPage => self.next_page(),
            SessionCommand::PrevPage => self.prev_page(),
            SessionCommand::SetPage { page } => self.set_page(page),
            SessionCommand::SetVoice { voice } => self.set_voice(voice),
            SessionCommand::Clear => self.clear(),
        }
        None
    }

    /// Tokens rendered on the current page.
    pub fn page_tokens(&self) -> &[Token] {
        match self.pages.current_page() {
            Some(page) => tokens_in_range(&self.tokens, page.start, page.end),
            None => &[],
        }
    }

    /// Untimed segments of the current page, offsets relative to the full
    /// text. Used when no tokens exist yet.
    pub fn page_segments(&self) -> Vec<Segment> {
        let Some(page) = self.pages.current_page() else {
            return Vec::new();
        };
        static_segments(&page.content)
            .into_iter()
            .map(|segment| Segment {
                start: segment.start + page.start,
                end: segment.end + page.start,
                ..segment
            })
            .collect()
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        let active_token = self.sync.active_token();
        ReaderSnapshot {
            status: self.status,
            position_secs: self.transport.position(),
            duration_secs: self.transport.duration(),
            speed: self.transport.speed(),
            voice: self.settings.voice.clone(),
            current_page: self.pages.current(),
            total_pages: self.pages.len(),
            page_text: self
                .pages
                .current_page()
                .map(|page| page.content.clone())
                .unwrap_or_default(),
            active_token,
            active_word: active_token
                .and_then(|id| self.tokens.get(id))
                .map(|token| token.text.clone()),
            has_timing: !self.tokens.is_empty(),
            summary: self.summary.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn finish_playback(&mut self) {
        self.transport.finish();
        self.sync.cancel();
        self.set_active_token(None);
        self.events.push(ReaderEvent::PlaybackFinished);
    }

    fn set_active_token(&mut self, token: Option<usize>) {
        if self.sync.set_active(token) {
            self.announce_active_token(token);
        }
    }

    fn announce_active_token(&mut self, token: Option<usize>) {
        self.events.push(ReaderEvent::ActiveTokenChanged { token });
        let Some(offset) = token
            .and_then(|id| self.tokens.get(id))
            .map(|token| token.char_start)
        else {
            return;
        };
        if let Some(page) = self.pages.follow_offset(offset) {
            debug!(page, offset, "Turning page to follow speech");
            self.events.push(ReaderEvent::PageChanged { page });
        }
    }

    fn handle_transport_error(&mut self, err: TransportError) {
        match err {
            TransportError::Render(err) => {
                self.sync.cancel();
                self.set_active_token(None);
                warn!("Audio output failed: {err}");
                self.report_error(format!("Audio output failed: {err}"));
            }
            TransportError::Busy | TransportError::NoAudio => {
                debug!("Ignoring transport request: {err}");
            }
        }
    }

    fn report_error(&mut self, message: String) {
        self.last_error = Some(message.clone());
        self.events.push(ReaderEvent::Error { message });
    }

    fn compute_status(&self) -> TransportStatus {
        match self.transport.state() {
            TransportState::Generating => TransportStatus::Generating,
            TransportState::Playing => TransportStatus::Playing,
            TransportState::Stopped if self.last_error.is_some() => TransportStatus::Error,
            TransportState::Stopped if self.transport.has_audio() => TransportStatus::Stopped,
            TransportState::Stopped => TransportStatus::Idle,
        }
    }

    fn refresh_status(&mut self) {
        let status = self.compute_status();
        if status != self.status {
            debug!(?status, previous = ?self.status, "Transport status changed");
            self.status = status;
            self.events.push(ReaderEvent::StatusChanged { status });
        }
    }
}
