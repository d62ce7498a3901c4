//! HTTP client for the Notion API.
//!
//! One [`NotionClient`] per process; it wraps a pooled `reqwest::Client`
//! and is cheap to clone.

use crate::config::NotionSettings;
use crate::error::{NotesError, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const VERSION_HEADER: &str = "Notion-Version";

#[derive(Debug, Clone)]
pub struct NotionClient {
    base_url: String,
    database_id: String,
    page_size: u32,
    client: reqwest::Client,
}

impl NotionClient {
    /// Build a client with bearer auth and the API version header preset.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::Config`] if the token or version cannot be used
    /// as a header value, or the HTTP client cannot be built.
    pub fn new(settings: &NotionSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|e| NotesError::Config(format!("invalid notion token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        let version = HeaderValue::from_str(&settings.api_version)
            .map_err(|e| NotesError::Config(format!("invalid notion api version: {e}")))?;
        headers.insert(VERSION_HEADER, version);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| NotesError::Config(format!("cannot build http client: {e}")))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            database_id: settings.database_id.clone(),
            page_size: settings.page_size,
            client,
        })
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Page size used by [`drain`](Self::drain).
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Create a page in the configured database from a merged properties object.
    pub async fn create_page(&self, properties: Value) -> Result<Value> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        self.post_json("/v1/pages", &body).await
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<Value> {
        debug!(path, "GET");
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(path, "POST");
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NotesError::Transport {
            status: status.as_u16(),
            body,
        });
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| NotesError::parse(format!("response is not JSON: {e}")))
}
