//! REST table client.
//!
//! Writes batches with a PostgREST-style insert: a JSON array POSTed
//! to `{url}/rest/v1/{table}` with the API key in both the `apikey`
//! and `Authorization` headers. HTTP status codes drive the
//! transient/persistent classification the Loader retries on.

use reqwest::StatusCode;
use serde_json::Value;

use super::BatchWriter;
use crate::config::LoadConfig;
use crate::error::LoadError;

/// Batch writer backed by the store's REST endpoint.
pub struct RestWriter {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl RestWriter {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        }
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Probe whether the target table exists with a one-row select.
    ///
    /// Non-destructive; callers use this to warn before a load against
    /// a table that was never created.
    pub async fn table_exists(&self, table: &str) -> Result<bool, LoadError> {
        let response = self
            .client
            .get(self.endpoint(table))
            .query(&[("select", "*"), ("limit", "1")])
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        probe_outcome(status, body)
    }
}

/// Map the probe response onto existence or a classified failure.
fn probe_outcome(status: StatusCode, body: String) -> Result<bool, LoadError> {
    if status.is_success() {
        Ok(true)
    } else if status == StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        if is_transient_status(status) {
            Err(LoadError::transient(Some(status.as_u16()), message))
        } else {
            Err(LoadError::persistent(Some(status.as_u16()), message))
        }
    }
}

impl BatchWriter for RestWriter {
    async fn insert(&self, table: &str, rows: &[Value]) -> Result<(), LoadError> {
        let response = self
            .client
            .post(self.endpoint(table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        if is_transient_status(status) {
            Err(LoadError::transient(Some(status.as_u16()), message))
        } else {
            Err(LoadError::persistent(Some(status.as_u16()), message))
        }
    }
}

/// Connection-level failures are transient by definition; anything
/// that produced no response cannot be a schema or auth problem.
fn classify_request_error(err: reqwest::Error) -> LoadError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        LoadError::transient(None, err.to_string())
    } else {
        LoadError::persistent(None, err.to_string())
    }
}

/// Throttling and server-side errors are worth retrying; client
/// errors (auth, constraint violation, schema mismatch) are not.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
