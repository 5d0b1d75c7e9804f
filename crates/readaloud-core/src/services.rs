//! External collaborators: text simplification and speech synthesis.
//!
//! The engine only consumes these through the traits below. Concrete clients
//! live in the host binary.

use crate::render::AudioBuffer;
use crate::tokenizer::{TokenizeError, validate_markup};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// How aggressively the simplifier rewrites the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum SimplificationLevel {
    /// Simple language, full paragraphs.
    #[default]
    Standard,
    /// Bulleted lists, grouped ideas.
    Structured,
    /// Ultra-concise summary.
    Short,
}

impl std::fmt::Display for SimplificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SimplificationLevel::Standard => "standard",
            SimplificationLevel::Structured => "structured",
            SimplificationLevel::Short => "short",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SimplificationResult {
    pub simplified_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

impl SimplificationResult {
    /// Reject results the reader cannot display: broken term markup or quiz
    /// answers that point past their options.
    pub fn validated(self) -> Result<Self, SimplificationError> {
        validate_markup(&self.simplified_text)?;
        if let Some((idx, _)) = self
            .quiz
            .iter()
            .enumerate()
            .find(|(_, q)| q.correct_answer_index >= q.options.len())
        {
            return Err(SimplificationError::Malformed(format!(
                "quiz question {idx} has no option for its answer"
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Error)]
pub enum SimplificationError {
    #[error("simplification request failed: {0}")]
    Request(String),
    #[error("simplification response was malformed: {0}")]
    Malformed(String),
    #[error("simplified text has invalid term markup: {0}")]
    Markup(#[from] TokenizeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("speech backend failed: {0}")]
    Backend(String),
    #[error("speech backend returned no audio")]
    Empty,
}

pub trait Simplifier {
    fn simplify(
        &self,
        text: &str,
        level: SimplificationLevel,
        language: &str,
    ) -> Result<SimplificationResult, SimplificationError>;
}

/// Turns spoken text into audio. Implementations may block; hosts run them
/// off the session thread.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, SynthesisError>;
}
