//! Record listing, lookup and deletion over the key-value store.
//!
//! Listing never fails: a store error yields an empty list, and an entry that
//! does not parse as a `ResumeRecord` is skipped with a warning.

pub mod handlers;

use tracing::{error, warn};

use crate::errors::AppError;
use crate::models::record::{record_key, ResumeRecord, RECORD_KEY_PATTERN};
use crate::session::Session;

pub async fn list_records(session: &Session) -> Vec<ResumeRecord> {
    if !session.authenticated {
        return Vec::new();
    }

    let entries = match session.kv.list(RECORD_KEY_PATTERN, true).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list resume records: {e:?}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let raw = entry.value?;
            match ResumeRecord::from_json(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed record under {}: {e}", entry.key);
                    None
                }
            }
        })
        .collect()
}

/// Loads one record. `Ok(None)` when no record exists under the id.
pub async fn get_record(session: &Session, id: &str) -> Result<Option<ResumeRecord>, AppError> {
    if !session.authenticated {
        return Err(AppError::Unauthorized);
    }

    let raw = session
        .kv
        .get(&record_key(id))
        .await
        .map_err(|e| AppError::Storage(format!("Failed to read record {id}: {e}")))?;

    raw.map(|raw| {
        ResumeRecord::from_json(&raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Record {id} is malformed: {e}")))
    })
    .transpose()
}

/// Removes the record's key-value entry. The uploaded document and preview
/// stay in the blob store.
pub async fn delete_record(session: &Session, id: &str) -> Result<(), AppError> {
    if !session.authenticated {
        return Err(AppError::Unauthorized);
    }

    session
        .kv
        .delete(&record_key(id))
        .await
        .map_err(|e| AppError::Storage(format!("Failed to delete record {id}: {e}")))
}
