//! Terminal host for a [`ReaderSession`].
//!
//! One thread owns the session. Keyboard lines, synthesis results and Ctrl+C
//! all arrive on a single channel; between messages the loop wakes once per
//! frame interval to run the highlight tick.

use crate::config::AppConfig;
use crate::input::{HELP, PlayerInput, parse_input, step_speed};
use crate::wav::write_wav;
use anyhow::{Context, Result, anyhow};
use readaloud_core::{
    AudioBuffer, ReaderEvent, ReaderSession, SessionCommand, SpeechSynthesizer, SynthesisError,
    SynthesisRequest, TransportStatus,
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use tracing::{debug, info, warn};

enum PlayerMessage {
    Line(String),
    InputClosed,
    Synthesized {
        request_id: u64,
        result: Result<AudioBuffer, SynthesisError>,
    },
    Interrupt,
}

pub struct Player {
    session: ReaderSession,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: AppConfig,
    tx: Sender<PlayerMessage>,
    rx: mpsc::Receiver<PlayerMessage>,
}

impl Player {
    pub fn new(
        session: ReaderSession,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: AppConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            session,
            synthesizer,
            config,
            tx,
            rx,
        }
    }

    pub fn run(mut self, autoplay: bool) -> Result<()> {
        self.spawn_stdin_reader();
        let interrupt_tx = self.tx.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            let _ = interrupt_tx.send(PlayerMessage::Interrupt);
        }) {
            warn!("Failed to install Ctrl+C signal handler: {err}");
        }

        println!("{HELP}");
        self.flush_events();
        self.print_page();
        if autoplay {
            self.dispatch(PlayerInput::Session(SessionCommand::TogglePlayback));
        }

        let frame_interval = self.config.frame_interval();
        let mut input_closed = false;
        loop {
            match self.rx.recv_timeout(frame_interval) {
                Ok(PlayerMessage::Line(line)) => match parse_input(&line, &self.config.keys) {
                    Some(PlayerInput::Quit) => break,
                    Some(input) => self.dispatch(input),
                    None => println!("unknown command: {}", line.trim()),
                },
                Ok(PlayerMessage::Synthesized { request_id, result }) => {
                    self.session.resolve_synthesis(request_id, result);
                }
                Ok(PlayerMessage::Interrupt) => {
                    info!("Received Ctrl+C; stopping playback");
                    break;
                }
                Ok(PlayerMessage::InputClosed) => {
                    debug!("Input closed; exiting once playback ends");
                    input_closed = true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.drive_frame();
            self.flush_events();
            if input_closed && !self.is_busy() {
                break;
            }
        }

        self.session.stop();
        self.flush_events();
        info!("Player exited");
        Ok(())
    }

    fn spawn_stdin_reader(&self) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(PlayerMessage::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(PlayerMessage::InputClosed);
        });
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.session.status(),
            TransportStatus::Playing | TransportStatus::Generating
        )
    }

    fn drive_frame(&mut self) {
        if let Some(ticket) = self.session.take_scheduled_frame() {
            self.session.on_frame(ticket);
        }
    }

    fn dispatch(&mut self, input: PlayerInput) {
        match input {
            PlayerInput::Session(command) => {
                if let Some(request) = self.session.apply_command(command) {
                    self.spawn_synthesis(request);
                }
            }
            PlayerInput::SpeedUp | PlayerInput::SpeedDown => {
                let up = matches!(input, PlayerInput::SpeedUp);
                let speed = step_speed(self.session.speed(), up);
                self.session.change_speed(speed);
                println!("speed {:.2}x", self.session.speed());
            }
            PlayerInput::Export(path) => {
                if let Err(err) = self.export(&path) {
                    warn!("Export failed: {err:#}");
                    println!("export failed: {err:#}");
                }
            }
            PlayerInput::Status => self.print_status(),
            PlayerInput::Help => println!("{HELP}"),
            PlayerInput::Quit => {}
        }
    }

    fn spawn_synthesis(&self, request: SynthesisRequest) {
        let tx = self.tx.clone();
        let synthesizer = Arc::clone(&self.synthesizer);
        println!("generating audio...");
        thread::spawn(move || {
            let result = synthesizer.synthesize(&request.text, &request.voice);
            let _ = tx.send(PlayerMessage::Synthesized {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn export(&self, path: &Path) -> Result<()> {
        let audio = self
            .session
            .audio()
            .ok_or_else(|| anyhow!("no audio has been generated yet"))?;
        write_wav(path, audio).with_context(|| format!("Exporting to {}", path.display()))?;
        info!(path = %path.display(), duration = audio.duration(), "Exported audio");
        println!("saved {}", path.display());
        Ok(())
    }

    fn flush_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                ReaderEvent::ActiveTokenChanged { token: Some(id) } => {
                    if let Some(token) = self.session.tokens().get(id) {
                        let marker = if token.is_term { "*" } else { "" };
                        print!("{marker}{}{marker} ", token.text);
                        let _ = io::stdout().flush();
                    }
                }
                ReaderEvent::ActiveTokenChanged { token: None } => {}
                ReaderEvent::PageChanged { .. } => {
                    println!();
                    self.print_page();
                }
                ReaderEvent::StatusChanged { status } => {
                    println!("\n[{}]", status_label(status));
                }
                ReaderEvent::PlaybackFinished => self.print_quiz(),
                ReaderEvent::Error { message } => println!("\nerror: {message}"),
            }
        }
    }

    fn print_page(&self) {
        let snapshot = self.session.snapshot();
        if snapshot.total_pages == 0 {
            println!("(no text)");
            return;
        }
        println!(
            "--- page {}/{} ---",
            snapshot.current_page + 1,
            snapshot.total_pages
        );
        let rendered: String = self
            .session
            .page_segments()
            .into_iter()
            .map(|segment| {
                if segment.is_term {
                    format!("*{}*", segment.text)
                } else {
                    segment.text
                }
            })
            .collect();
        println!("{}", rendered.trim_end());
    }

    fn print_status(&self) {
        let snapshot = self.session.snapshot();
        println!(
            "[{}] {:.1}/{:.1}s speed {:.2}x voice {} page {}/{}{}",
            status_label(snapshot.status),
            snapshot.position_secs,
            snapshot.duration_secs,
            snapshot.speed,
            snapshot.voice,
            snapshot.current_page + 1,
            snapshot.total_pages.max(1),
            snapshot
                .active_word
                .map(|word| format!(" word \"{word}\""))
                .unwrap_or_default()
        );
        if !snapshot.summary.is_empty() {
            println!("summary: {}", snapshot.summary);
        }
    }

    fn print_quiz(&self) {
        let quiz = self.session.quiz();
        if quiz.is_empty() {
            return;
        }
        println!("quiz:");
        for (idx, question) in quiz.iter().enumerate() {
            println!("{}. {}", idx + 1, question.question);
            for (opt_idx, option) in question.options.iter().enumerate() {
                let mark = if opt_idx == question.correct_answer_index {
                    "+"
                } else {
                    " "
                };
                println!("   {mark} {option}");
            }
        }
    }
}

fn status_label(status: TransportStatus) -> &'static str {
    match status {
        TransportStatus::Idle => "idle",
        TransportStatus::Generating => "generating",
        TransportStatus::Playing => "playing",
        TransportStatus::Stopped => "stopped",
        TransportStatus::Error => "error",
    }
}
