//! `web_search` / `fetch_webpage` — read-only, parallel-safe tools over the
//! internet-access category (spec.md §8 scenario 1 names both explicitly as
//! part of the same batch as `create_note` and `send_telegram_message`, so
//! they need a `SideEffectClass::ReadOnly` counterpart alongside the
//! mutating tools already in this module). The concrete search engine / HTTP
//! fetcher is an external collaborator (spec.md §1); [`WebClient`] is the
//! seam a real implementation plugs into.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ToolDefinition;
use crate::error::AgentError;
use crate::tools::{Tool, ToolCallContext};

/// The internet-access capability a real implementation (a search API
/// client, an HTTP fetcher, optionally a headless browser) provides.
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AgentError>;
    async fn fetch(&self, url: &str) -> Result<String, AgentError>;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Checks `url`'s host against `allowed`, spec.md §3's
/// `Permissions.allowedWebsites` ("host patterns"). Empty means unrestricted.
/// A pattern matches if it equals the host or the host ends with `.<pattern>`
/// (so `example.com` also allows `www.example.com`).
fn host_allowed(url: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_lowercase();
    allowed.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        host == pattern || host.ends_with(&format!(".{pattern}"))
    })
}

pub struct WebSearch {
    pub client: std::sync::Arc<dyn WebClient>,
}

impl WebSearch {
    pub fn new(client: std::sync::Arc<dyn WebClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read_only(
            "web_search",
            "Searches the web and returns ranked results.",
            json!({
                "type": "object",
                "properties": {"q": {"type": "string"}},
                "required": ["q"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        if !ctx.permissions.internet_access {
            return Err(AgentError::PermissionDenied("internetAccess".into()));
        }
        let query = params
            .get("q")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing q".into()))?;
        let results = self.client.search(query).await?;
        Ok(json!({ "results": results }))
    }
}

pub struct FetchWebpage {
    pub client: std::sync::Arc<dyn WebClient>,
}

impl FetchWebpage {
    pub fn new(client: std::sync::Arc<dyn WebClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for FetchWebpage {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read_only(
            "fetch_webpage",
            "Fetches the text content of a URL.",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"]
            }),
        )
    }

    async fn call(&self, params: Value, ctx: &ToolCallContext) -> Result<Value, AgentError> {
        if !ctx.permissions.internet_access {
            return Err(AgentError::PermissionDenied("internetAccess".into()));
        }
        let url = params
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ValidationError("missing url".into()))?;
        if !host_allowed(url, &ctx.permissions.allowed_websites) {
            return Err(AgentError::PermissionDenied(format!(
                "{url} is not in allowedWebsites"
            )));
        }
        let content = self.client.fetch(url).await?;
        Ok(json!({ "content": content }))
    }
}
