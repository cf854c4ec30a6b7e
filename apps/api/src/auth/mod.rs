//! Authentication: opaque bearer tokens issued on sign-in and stored in the
//! key-value store under `session:{token}`.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::stores::KvStore;

const SESSION_KEY_PREFIX: &str = "session:";
/// Sessions expire a week after sign-in.
const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn is_authenticated(&self, token: Option<&str>) -> Result<bool>;

    /// Returns a fresh token, or `None` when the credentials are wrong.
    async fn sign_in(&self, password: &str) -> Result<Option<String>>;

    async fn sign_out(&self, token: &str) -> Result<()>;
}

/// Single shared access password; every signed-in caller sees the same records.
pub struct KvSessionAuth {
    kv: Arc<dyn KvStore>,
    access_password: String,
}

impl KvSessionAuth {
    pub fn new(kv: Arc<dyn KvStore>, access_password: String) -> Self {
        Self {
            kv,
            access_password,
        }
    }
}

fn session_key(token: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{token}")
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl AuthService for KvSessionAuth {
    async fn is_authenticated(&self, token: Option<&str>) -> Result<bool> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        Ok(self.kv.get(&session_key(token)).await?.is_some())
    }

    async fn sign_in(&self, password: &str) -> Result<Option<String>> {
        if !constant_time_eq(password.as_bytes(), self.access_password.as_bytes()) {
            return Ok(None);
        }
        let token = Uuid::new_v4().simple().to_string();
        let session = json!({ "created_at": Utc::now() }).to_string();
        self.kv
            .set_with_expiry(&session_key(&token), session, SESSION_TTL)
            .await?;
        info!("New session issued");
        Ok(Some(token))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        self.kv.delete(&session_key(token)).await
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
