//! HTTP client executing queries against an OpenSearch cluster.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tripwire_core::config::OpenSearchConfig;
use tripwire_core::Document;
use tripwire_rules::{SearchBackend, SearchBackendError, SearchQuery};

use crate::dsl::search_body;

/// Issues `POST {base}/{index}/_search` requests.
///
/// The underlying [`reqwest::Client`] pools connections, so one instance is
/// shared by every concurrent rule run.
pub struct OpenSearchClient {
    client: reqwest::Client,
    base_url: String,
    index: String,
    credentials: Option<(String, Option<String>)>,
}

impl OpenSearchClient {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
            credentials: None,
        }
    }

    pub fn from_config(config: &OpenSearchConfig) -> Self {
        let client = Self::new(config.base_url(), config.index.clone());
        match &config.username {
            Some(user) => client.with_basic_auth(user.clone(), config.password.clone()),
            None => client,
        }
    }

    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

#[async_trait]
impl SearchBackend for OpenSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Document>, SearchBackendError> {
        let url = self.search_url();
        let body = search_body(query);
        debug!(url = %url, window = %query.window(), "OpenSearch request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchBackendError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchBackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| SearchBackendError::Decode(e.to_string()))?;
        decode_hits(resp)
    }

    fn backend_name(&self) -> &str {
        "opensearch"
    }
}

/// Pull `hits.hits` out of a search response.
fn decode_hits(mut resp: Value) -> Result<Vec<Document>, SearchBackendError> {
    let hits = match resp.pointer_mut("/hits/hits").map(Value::take) {
        Some(Value::Array(hits)) => hits,
        Some(_) => return Err(SearchBackendError::Decode("hits.hits is not an array".into())),
        None => return Err(SearchBackendError::Decode("missing hits.hits".into())),
    };

    hits.into_iter()
        .map(|hit| Document::from_hit(hit).map_err(|e| SearchBackendError::Decode(e.to_string())))
        .collect()
}
