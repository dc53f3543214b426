use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};

/// HTTP client for the chainpilot action and status endpoints
#[derive(Clone)]
pub struct EngineClient {
    client: Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Call `POST /action` with `{"action": name, ...params}`
    pub async fn action(&self, name: &str, params: Map<String, Value>) -> Result<Value> {
        let mut body = params;
        body.insert("action".to_string(), Value::String(name.to_string()));
        let url = format!("{}/action", self.base_url);
        send(self.client.post(&url).json(&body), "action").await
    }

    /// Call `GET /cards`
    pub async fn cards(&self) -> Result<Value> {
        let url = format!("{}/cards", self.base_url);
        send(self.client.get(&url), "cards").await
    }

    /// Call `DELETE /cards/{hash}`
    pub async fn dismiss(&self, hash: &str) -> Result<Value> {
        let url = format!("{}/cards/{}", self.base_url, hash);
        send(self.client.delete(&url), "dismiss").await
    }

    /// Call `GET /session`
    pub async fn session(&self) -> Result<Value> {
        let url = format!("{}/session", self.base_url);
        send(self.client.get(&url), "session").await
    }
}

async fn send(request: RequestBuilder, what: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to send {what} request"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {what} response body"))?;
    if !status.is_success() {
        anyhow::bail!("{} request failed with status {}: {}", what, status, body);
    }

    serde_json::from_str(&body).with_context(|| {
        let truncated = if body.len() > 200 { &body[..200] } else { &body };
        format!("Failed to parse {what} response: {truncated}")
    })
}

/// Parse the optional JSON object given after the action name.
pub fn parse_params(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str(raw).context("Action parameters must be JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Action parameters must be a JSON object, got {other}"),
    }
}
