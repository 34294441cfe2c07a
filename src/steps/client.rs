//! Remote collaborators: tool servers and the text generator.
//!
//! Both are traits so the executor can be driven by in-process fakes; the
//! HTTP implementations speak the plain JSON contracts below.
//!
//! - Tool call: `POST {endpoint}/tools/{function}` with the resolved params
//!   as the body; any JSON response, optionally carrying `meta.cost`.
//! - Text generation: `POST {endpoint}` with `{"message", "model"}`,
//!   answered by `{"content"}`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Calls functions on remote tool servers.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Invoke `function` on the server at `endpoint` and return its JSON reply.
    async fn call(&self, endpoint: &str, function: &str, params: &Value) -> Result<Value>;
}

/// Produces free text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String>;
}

/// Tool server name -> base endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerDirectory {
    endpoints: BTreeMap<String, String>,
}

impl ServerDirectory {
    pub fn new(endpoints: BTreeMap<String, String>) -> Self {
        Self { endpoints }
    }

    pub fn with_server(mut self, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), endpoint.into());
        self
    }

    /// Look up a server. Unknown names are a step error.
    pub fn endpoint(&self, server: &str) -> Result<&str> {
        self.endpoints
            .get(server)
            .map(String::as_str)
            .ok_or_else(|| Error::Step(format!("Unknown tool server '{}'", server)))
    }
}

/// [`ToolClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpToolClient {
    client: Client,
    timeout: Duration,
}

impl HttpToolClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

pub(crate) fn tool_url(endpoint: &str, function: &str) -> String {
    format!("{}/tools/{}", endpoint.trim_end_matches('/'), function)
}

#[async_trait]
impl ToolClient for HttpToolClient {
    async fn call(&self, endpoint: &str, function: &str, params: &Value) -> Result<Value> {
        let url = tool_url(endpoint, function);
        debug!(url = %url, "Calling tool");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| Error::Step(format!("Tool request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Step(format!(
                "Tool {} returned {}: {}",
                function,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Step(format!("Tool {} returned invalid JSON: {}", function, e)))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: String,
}

/// [`TextGenerator`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: Client,
    endpoint: String,
    default_model: Option<String>,
    timeout: Duration,
}

impl HttpTextGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            default_model: None,
            timeout,
        }
    }

    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model;
        self
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let request = GenerateRequest {
            message: prompt,
            model: model.or(self.default_model.as_deref()),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Step(format!("Text generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Step(format!(
                "Text generation error ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Step(format!("Failed to parse text generation response: {}", e)))?;

        Ok(parsed.content)
    }
}
