//! Playback and word-highlight synchronization for read-aloud text.
//!
//! The engine is host-agnostic: audio output, speech synthesis and the frame
//! driver are supplied by the embedding application through the traits in
//! [`render`] and [`services`].

pub mod clock;
pub mod pagination;
pub mod render;
pub mod services;
pub mod session;
pub mod signal;
pub mod sync_loop;
pub mod tokenizer;
pub mod transport;

pub use clock::{MonotonicTime, TimeSource, clamp_speed};
pub use pagination::{Page, repaginate};
pub use render::{AudioBuffer, AudioRenderer, RenderError, SilentRenderer};
pub use services::{
    QuizQuestion, SimplificationError, SimplificationLevel, SimplificationResult, Simplifier,
    SpeechSynthesizer, SynthesisError,
};
pub use session::{
    ReaderEvent, ReaderSession, ReaderSnapshot, SessionCommand, SessionSettings,
    SynthesisRequest, TransportStatus,
};
pub use signal::CompletionSignal;
pub use sync_loop::FrameTicket;
pub use tokenizer::{Segment, Token, TokenizeError, spoken_text, tokenize};
