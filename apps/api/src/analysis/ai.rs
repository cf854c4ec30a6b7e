//! The AI scoring collaborator and the parsing of its reply into `Feedback`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm_client::strip_json_fences;
use crate::models::feedback::{Feedback, FeedbackInvalid};

/// Scores a stored document against job-context instructions.
/// `Ok(None)` means the service produced no answer.
#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn feedback(&self, document_path: &str, instructions: &str) -> Result<Option<AiResponse>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiResponse {
    pub message: AiMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiMessage {
    pub content: MessageContent,
}

/// Reply content: either one string or a list of typed blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<AiContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl AiResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            message: AiMessage {
                content: MessageContent::Text(text.into()),
            },
        }
    }

    /// The first textual part of the reply.
    pub fn text(&self) -> Option<&str> {
        match &self.message.content {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.block_type.as_deref().map_or(true, |t| t == "text"))
                .find_map(|b| b.text.as_deref()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("reply contains no text block")]
    NoText,

    #[error("reply is not valid feedback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("feedback violates invariants: {0}")]
    Invalid(#[from] FeedbackInvalid),
}

/// Extracts, unwraps and validates the feedback JSON from an AI reply.
pub fn parse_feedback(response: &AiResponse) -> Result<Feedback, FeedbackParseError> {
    let text = response.text().ok_or(FeedbackParseError::NoText)?;
    let feedback: Feedback = serde_json::from_str(strip_json_fences(text))?;
    feedback.validate()?;
    Ok(feedback)
}
