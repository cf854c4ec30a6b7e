use serde::{Deserialize, Serialize};

use crate::models::feedback::FeedbackState;

/// Key-value prefix under which every resume record lives.
pub const RECORD_KEY_PREFIX: &str = "resume:";

/// Pattern matching every stored resume record.
pub const RECORD_KEY_PATTERN: &str = "resume:*";

pub fn record_key(id: &str) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// The persisted unit of work, stored verbatim as JSON under `resume:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    pub resume_path: String,
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub feedback: FeedbackState,
}

impl ResumeRecord {
    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
