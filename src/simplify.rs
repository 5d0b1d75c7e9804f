//! HTTP client for the text-simplification service.
//!
//! The service receives `{ text, level, language }` as JSON and answers with
//! `{ simplifiedText, summary, quiz }`. Term markup in the answer is checked
//! before the reader accepts it.

use readaloud_core::{SimplificationError, SimplificationLevel, SimplificationResult, Simplifier};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct SimplifyRequest<'a> {
    text: &'a str,
    level: SimplificationLevel,
    language: &'a str,
}

pub struct HttpSimplifier {
    client: Client,
    endpoint: String,
}

impl HttpSimplifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SimplificationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SimplificationError::Request(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl Simplifier for HttpSimplifier {
    fn simplify(
        &self,
        text: &str,
        level: SimplificationLevel,
        language: &str,
    ) -> Result<SimplificationResult, SimplificationError> {
        info!(
            endpoint = %self.endpoint,
            %level,
            %language,
            chars = text.chars().count(),
            "Requesting simplification"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SimplifyRequest {
                text,
                level,
                language,
            })
            .send()
            .map_err(|err| SimplificationError::Request(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| SimplificationError::Request(err.to_string()))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Simplification service rejected request");
            return Err(SimplificationError::Request(format!(
                "status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        parse_response(&body)
    }
}

pub fn parse_response(body: &str) -> Result<SimplificationResult, SimplificationError> {
    let result: SimplificationResult = serde_json::from_str(body)
        .map_err(|err| SimplificationError::Malformed(err.to_string()))?;
    let result = result.validated()?;
    debug!(
        chars = result.simplified_text.chars().count(),
        quiz = result.quiz.len(),
        "Parsed simplification"
    );
    Ok(result)
}
