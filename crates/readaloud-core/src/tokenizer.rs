//! Word-level timing estimates for annotated text.
//!
//! The synthesizer only reports the total length of the audio it produced, so
//! each token's window is apportioned linearly by character count. This is an
//! approximation of prosody, not an alignment.
//!
//! Terms are written as `{{term}}`. The delimiters are not spoken and consume
//! no time, but token offsets for terms still cover them so the rendered span
//! lines up with the source text. All offsets are byte offsets into the
//! original string and always land on character boundaries.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

pub const TERM_OPEN: &str = "{{";
pub const TERM_CLOSE: &str = "}}";

// Alternation order matters: a complete term wins over a dangling delimiter,
// and a lone brace falls through to punctuation.
static RE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\{\{(?P<term>.*?)\}\}|(?P<open>\{\{)|(?P<close>\}\})|(?P<word>[\w']+)|(?P<space>\s+)|(?P<punct>[^\w\s{}]+|[{}])",
    )
    .unwrap()
});
static RE_TERM_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+|\s+").unwrap());
static RE_TERM_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());

/// A unit of highlighting with its estimated time window.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct Token {
    pub id: usize,
    pub text: String,
    pub is_term: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub char_start: usize,
    pub char_end: usize,
}

impl Token {
    pub fn contains_time(&self, position: f64) -> bool {
        position >= self.start_time && position < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("term opened at byte {offset} is never closed")]
    UnterminatedTerm { offset: usize },
    #[error("term close at byte {offset} has no matching open")]
    UnmatchedTermClose { offset: usize },
}

/// A slice of text for untimed rendering: plain prose or a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Segment {
    pub text: String,
    pub is_term: bool,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Term { content_start: usize, content_end: usize },
    Word,
    Punct,
    Space,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    kind: RunKind,
    start: usize,
    end: usize,
}

impl Run {
    fn spoken<'a>(&self, text: &'a str) -> &'a str {
        match self.kind {
            RunKind::Term {
                content_start,
                content_end,
            } => &text[content_start..content_end],
            _ => &text[self.start..self.end],
        }
    }
}

fn scan(text: &str) -> Result<Vec<Run>, TokenizeError> {
    let mut runs = Vec::new();
    for caps in RE_RUN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let kind = if let Some(term) = caps.name("term") {
            RunKind::Term {
                content_start: term.start(),
                content_end: term.end(),
            }
        } else if caps.name("open").is_some() {
            return Err(TokenizeError::UnterminatedTerm {
                offset: whole.start(),
            });
        } else if caps.name("close").is_some() {
            return Err(TokenizeError::UnmatchedTermClose {
                offset: whole.start(),
            });
        } else if caps.name("word").is_some() {
            RunKind::Word
        } else if caps.name("space").is_some() {
            RunKind::Space
        } else {
            RunKind::Punct
        };
        runs.push(Run {
            kind,
            start: whole.start(),
            end: whole.end(),
        });
    }
    Ok(runs)
}

/// Check term markup without computing any timing.
pub fn validate_markup(text: &str) -> Result<(), TokenizeError> {
    scan(text).map(|_| ())
}

/// The text as it is spoken: term delimiters removed.
///
/// This is what gets sent to the synthesizer, so the audio and the timing
/// estimate are derived from the same characters.
pub fn spoken_text(text: &str) -> String {
    RE_TERM_SPAN.replace_all(text, "$1").into_owned()
}

/// Split `text` into timed tokens spread across `duration` seconds.
///
/// Returns an empty list when there is nothing to speak or no time to spread
/// it over; callers then fall back to [`static_segments`].
pub fn tokenize(text: &str, duration: f64) -> Result<Vec<Token>, TokenizeError> {
    let runs = scan(text)?;
    let spoken_len: usize = runs.iter().map(|run| run.spoken(text).chars().count()).sum();
    if spoken_len == 0 || !duration.is_finite() || duration <= 0.0 {
        return Ok(Vec::new());
    }

    let mut builder = TokenBuilder {
        text,
        per_char: duration / spoken_len as f64,
        cursor: 0.0,
        tokens: Vec::new(),
    };
    for run in runs {
        match run.kind {
            RunKind::Space => builder.advance(&text[run.start..run.end]),
            RunKind::Word | RunKind::Punct => {
                builder.push(&text[run.start..run.end], false, run.start, run.end)
            }
            RunKind::Term {
                content_start,
                content_end,
            } => builder.push_term(run.start, run.end, content_start, content_end),
        }
    }
    Ok(builder.tokens)
}

struct TokenBuilder<'a> {
    text: &'a str,
    per_char: f64,
    cursor: f64,
    tokens: Vec<Token>,
}

impl TokenBuilder<'_> {
    fn advance(&mut self, spoken: &str) {
        self.cursor += spoken.chars().count() as f64 * self.per_char;
    }

    fn push(&mut self, spoken: &str, is_term: bool, char_start: usize, char_end: usize) {
        let start_time = self.cursor;
        let end_time = start_time + spoken.chars().count() as f64 * self.per_char;
        self.tokens.push(Token {
            id: self.tokens.len(),
            text: spoken.to_string(),
            is_term,
            start_time,
            end_time,
            char_start,
            char_end,
        });
        self.cursor = end_time;
    }

    /// Multi-word terms become one token per word so highlighting moves at
    /// the same granularity as plain prose. The outer words absorb the
    /// delimiters into their offsets.
    fn push_term(
        &mut self,
        span_start: usize,
        span_end: usize,
        content_start: usize,
        content_end: usize,
    ) {
        let text = self.text;
        let content = &text[content_start..content_end];
        let parts: Vec<_> = RE_TERM_PART.find_iter(content).collect();
        let is_blank = |part: &regex::Match<'_>| part.as_str().chars().all(char::is_whitespace);
        let first_word = parts.iter().position(|part| !is_blank(part));
        let last_word = parts.iter().rposition(|part| !is_blank(part));

        for (idx, part) in parts.iter().enumerate() {
            if is_blank(part) {
                self.advance(part.as_str());
                continue;
            }
            let char_start = if Some(idx) == first_word {
                span_start
            } else {
                content_start + part.start()
            };
            let char_end = if Some(idx) == last_word {
                span_end
            } else {
                content_start + part.end()
            };
            self.push(part.as_str(), true, char_start, char_end);
        }
    }
}

/// Plain and term segments for rendering text that has no timing yet.
pub fn static_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0usize;
    for caps in RE_TERM_SPAN.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment {
                text: text[last..whole.start()].to_string(),
                is_term: false,
                start: last,
                end: whole.start(),
            });
        }
        segments.push(Segment {
            text: inner.as_str().to_string(),
            is_term: true,
            start: whole.start(),
            end: whole.end(),
        });
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment {
            text: text[last..].to_string(),
            is_term: false,
            start: last,
            end: text.len(),
        });
    }
    segments
}

/// The token whose `[start_time, end_time)` window holds `position`.
pub fn active_token_at(tokens: &[Token], position: f64) -> Option<&Token> {
    let idx = tokens.partition_point(|token| token.start_time <= position);
    let candidate = tokens.get(idx.checked_sub(1)?)?;
    candidate.contains_time(position).then_some(candidate)
}

/// Tokens that begin inside the byte range `[start, end)`.
pub fn tokens_in_range(tokens: &[Token], start: usize, end: usize) -> &[Token] {
    let lo = tokens.partition_point(|token| token.char_start < start);
    let hi = tokens.partition_point(|token| token.char_start < end);
    &tokens[lo..hi.max(lo)]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Hello world. {{Photosynthesis}} is great.";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn estimates_timing_from_spoken_characters() {
        let spoken = spoken_text(SAMPLE);
        assert_eq!(spoken, "Hello world. Photosynthesis is great.");
        let per_char = 4.0 / spoken.chars().count() as f64;

        let tokens = tokenize(SAMPLE, 4.0).unwrap();
        assert_eq!(
            texts(&tokens),
            vec!["Hello", "world", ".", "Photosynthesis", "is", "great", "."]
        );

        let hello = &tokens[0];
        assert!(approx(hello.start_time, 0.0));
        assert!(approx(hello.end_time, 5.0 * per_char));

        let term = &tokens[3];
        assert!(term.is_term);
        assert!(approx(term.end_time - term.start_time, 14.0 * per_char));
        // "Hello world. " precedes the term: 13 spoken chars.
        assert!(approx(term.start_time, 13.0 * per_char));
    }

    #[test]
    fn whitespace_advances_time_without_a_token() {
        let tokens = tokenize("ab  cd", 6.0).unwrap();
        assert_eq!(texts(&tokens), vec!["ab", "cd"]);
        assert!(approx(tokens[0].end_time, 2.0));
        assert!(approx(tokens[1].start_time, 4.0));
        assert!(approx(tokens[1].end_time, 6.0));
    }

    #[test]
    fn term_offsets_cover_delimiters() {
        let tokens = tokenize(SAMPLE, 4.0).unwrap();
        let term = &tokens[3];
        assert_eq!(term.char_start, SAMPLE.find("{{").unwrap());
        assert_eq!(term.char_end, SAMPLE.find("}}").unwrap() + 2);
        assert_eq!(&SAMPLE[term.char_start..term.char_end], "{{Photosynthesis}}");
    }

    #[test]
    fn multi_word_terms_split_per_word() {
        let text = "{{carbon dioxide}} gas";
        let tokens = tokenize(text, 2.2).unwrap();
        assert_eq!(texts(&tokens), vec!["carbon", "dioxide", "gas"]);
        assert!(tokens[0].is_term && tokens[1].is_term && !tokens[2].is_term);
        assert_eq!(tokens[0].char_start, 0);
        assert_eq!(&text[tokens[0].char_start..tokens[0].char_end], "{{carbon");
        assert_eq!(&text[tokens[1].char_start..tokens[1].char_end], "dioxide}}");
        // "carbon dioxide gas" is 18 spoken chars; the inner space is timed.
        assert!(approx(tokens[1].start_time, 7.0 * 2.2 / 18.0));
    }

    #[test]
    fn words_keep_apostrophes_and_punctuation_groups() {
        let tokens = tokenize("It's done...", 1.0).unwrap();
        assert_eq!(texts(&tokens), vec!["It's", "done", "..."]);
    }

    #[test]
    fn lone_braces_are_punctuation() {
        let tokens = tokenize("a { b }", 1.0).unwrap();
        assert_eq!(texts(&tokens), vec!["a", "{", "b", "}"]);
    }

    #[test]
    fn empty_inputs_yield_no_tokens() {
        assert!(tokenize("", 3.0).unwrap().is_empty());
        assert!(tokenize("   ", 3.0).unwrap().is_empty());
        assert!(tokenize("{{}}", 3.0).unwrap().is_empty());
        assert!(tokenize("Hello", 0.0).unwrap().is_empty());
        assert!(tokenize("Hello", f64::NAN).unwrap().is_empty());
    }

    #[test]
    fn dangling_delimiters_are_errors() {
        assert_eq!(
            tokenize("see {{this", 1.0),
            Err(TokenizeError::UnterminatedTerm { offset: 4 })
        );
        assert_eq!(
            validate_markup("oops}} here"),
            Err(TokenizeError::UnmatchedTermClose { offset: 4 })
        );
        assert_eq!(
            validate_markup("{{split\nterm}}"),
            Err(TokenizeError::UnterminatedTerm { offset: 0 })
        );
    }

    #[test]
    fn timings_are_monotonic_and_fill_the_duration() {
        let text = "The {{water cycle}} moves water.\nIt's {{driven}} by the sun!";
        let duration = 7.3;
        let tokens = tokenize(text, duration).unwrap();
        for pair in tokens.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time + 1e-12);
            assert!(pair[0].char_start <= pair[1].char_start);
        }
        let last = tokens.last().unwrap();
        assert!((last.end_time - duration).abs() < 1e-9);
        for (idx, token) in tokens.iter().enumerate() {
            assert_eq!(token.id, idx);
        }
    }

    #[test]
    fn offsets_respect_multibyte_text() {
        let text = "Café {{naïve}} über";
        let tokens = tokenize(text, 1.0).unwrap();
        assert_eq!(texts(&tokens), vec!["Café", "naïve", "über"]);
        assert_eq!(&text[tokens[0].char_start..tokens[0].char_end], "Café");
        assert_eq!(&text[tokens[2].char_start..tokens[2].char_end], "über");
    }

    #[test]
    fn finds_active_token_and_gaps() {
        let tokens = tokenize("ab  cd", 6.0).unwrap();
        assert_eq!(active_token_at(&tokens, 0.0).map(|t| t.id), Some(0));
        assert_eq!(active_token_at(&tokens, 1.99).map(|t| t.id), Some(0));
        assert_eq!(active_token_at(&tokens, 3.0), None);
        assert_eq!(active_token_at(&tokens, 4.0).map(|t| t.id), Some(1));
        assert_eq!(active_token_at(&tokens, 6.0), None);
        assert_eq!(active_token_at(&tokens, -1.0), None);
    }

    #[test]
    fn static_segments_mark_terms() {
        let segments = static_segments(SAMPLE);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Hello world. ");
        assert!(segments[1].is_term);
        assert_eq!(segments[1].text, "Photosynthesis");
        assert_eq!(segments[2].text, " is great.");
        assert_eq!(segments[2].end, SAMPLE.len());
    }

    #[test]
    fn selects_tokens_starting_in_range() {
        let text = "one two\nthree four";
        let tokens = tokenize(text, 4.0).unwrap();
        let second_line = tokens_in_range(&tokens, 8, text.len());
        assert_eq!(texts(second_line), vec!["three", "four"]);
        assert!(tokens_in_range(&tokens, 3, 4).is_empty());
    }
}
