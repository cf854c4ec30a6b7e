//! LLM Client: the single point of entry for all Claude API calls in Resumind.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All LLM interactions MUST go through this module.
//!
//! Model: claude-sonnet-4-5 (hardcoded; do not make configurable)
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::ai::{AiContentBlock, AiMessage, AiResponse, FeedbackService, MessageContent};
use crate::analysis::prompts::ANALYSIS_SYSTEM;
use crate::stores::BlobStore;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Resumind.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;
const PDF_MEDIA_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock<'a> {
    Document { source: DocumentSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct DocumentSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Re-shapes the Messages API reply into the block-list form the
    /// analysis pipeline parses.
    pub fn into_ai_response(self) -> AiResponse {
        let blocks = self
            .content
            .into_iter()
            .map(|b| AiContentBlock {
                block_type: Some(b.block_type),
                text: b.text,
            })
            .collect();
        AiResponse {
            message: AiMessage {
                content: MessageContent::Blocks(blocks),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services in Resumind.
/// Wraps the Anthropic Messages API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, api_key })
    }

    /// Sends a PDF as a base64 document block followed by the text prompt.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff;
    /// callers see only the final outcome.
    pub async fn call_with_document(
        &self,
        pdf: &[u8],
        prompt: &str,
        system: &str,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = document_request(pdf, prompt, system);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Exponential backoff before retry `attempt` (1-based): 1s, 2s, 4s, ...
fn retry_delay(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(1000 * (1 << (attempt - 1)))
}

fn document_request<'a>(pdf: &[u8], prompt: &'a str, system: &'a str) -> AnthropicRequest<'a> {
    AnthropicRequest {
        model: MODEL,
        max_tokens: MAX_TOKENS,
        system,
        messages: vec![AnthropicMessage {
            role: "user",
            content: vec![
                RequestBlock::Document {
                    source: DocumentSource {
                        source_type: "base64",
                        media_type: PDF_MEDIA_TYPE,
                        data: STANDARD.encode(pdf),
                    },
                },
                RequestBlock::Text { text: prompt },
            ],
        }],
    }
}

/// Claude-backed feedback: loads the stored PDF and asks the model to score it.
pub struct AnthropicFeedbackService {
    llm: LlmClient,
    blobs: Arc<dyn BlobStore>,
}

impl AnthropicFeedbackService {
    pub fn new(llm: LlmClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self { llm, blobs }
    }
}

#[async_trait]
impl FeedbackService for AnthropicFeedbackService {
    async fn feedback(&self, document_path: &str, instructions: &str) -> Result<Option<AiResponse>> {
        let Some(pdf) = self.blobs.read(document_path).await? else {
            warn!("Document {document_path} is missing from the blob store");
            return Ok(None);
        };

        info!("Requesting feedback for {document_path} ({} bytes)", pdf.len());
        match self
            .llm
            .call_with_document(&pdf, instructions, ANALYSIS_SYSTEM)
            .await
        {
            Ok(response) => Ok(Some(response.into_ai_response())),
            // The API answered but refused the request.
            Err(LlmError::Api { status, message }) if status < 500 && status != 429 => {
                warn!("Feedback request rejected ({status}): {message}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryBlobStore;
    use serde_json::json;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_retries_stay_within_the_call() {
        let waits: Vec<u64> = (1..MAX_RETRIES).map(|a| retry_delay(a).as_secs()).collect();
        assert_eq!(waits, vec![1, 2]);
    }

    #[test]
    fn test_document_request_wire_shape() {
        let body = serde_json::to_value(document_request(b"%PDF", "Rate it", "sys")).unwrap();
        assert_eq!(body["model"], MODEL);
        assert_eq!(body["system"], "sys");

        let content = &body["messages"][0]["content"];
        assert_eq!(
            content[0],
            json!({
                "type": "document",
                "source": { "type": "base64", "media_type": "application/pdf", "data": "JVBERg==" }
            })
        );
        assert_eq!(content[1], json!({ "type": "text", "text": "Rate it" }));
    }

    #[test]
    fn test_response_maps_to_block_list() {
        let response: LlmResponse = serde_json::from_value(json!({
            "content": [{ "type": "text", "text": "{\"a\":1}" }],
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        }))
        .unwrap();
        let ai = response.into_ai_response();
        assert_eq!(ai.text(), Some("{\"a\":1}"));
        assert!(matches!(ai.message.content, MessageContent::Blocks(_)));
    }

    #[tokio::test]
    async fn test_missing_document_yields_no_answer() {
        let llm = LlmClient::new("test-key".to_string()).unwrap();
        let service = AnthropicFeedbackService::new(llm, Arc::new(MemoryBlobStore::new()));
        let answer = service.feedback("memory/none/cv.pdf", "Rate it").await.unwrap();
        assert!(answer.is_none());
    }
}
