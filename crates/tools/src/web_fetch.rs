//! Web fetch tool: GET or POST a URL and return the body.
//!
//! Bodies are read chunk by chunk and cut at the configured ceiling, so a
//! huge download never lands in memory whole.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use rivet_config::WebFetchConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use tracing::debug;

/// Appended when the body hit the size ceiling.
pub const RESPONSE_TRUNCATION_MARKER: &str = "\n... (response truncated)";

pub struct WebFetchTool {
    client: Client,
    timeout_ms: u64,
    max_response_size: usize,
}

impl WebFetchTool {
    pub fn new(config: &WebFetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            timeout_ms: config.timeout_ms,
            max_response_size: config.max_response_size,
        }
    }

    async fn fetch(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        timeout_ms: u64,
    ) -> Result<ToolResult, ToolError> {
        let fail = |e: reqwest::Error| {
            if e.is_timeout() {
                timeout_error(timeout_ms)
            } else {
                ToolError::ExecutionFailed(format!("request failed: {e}"))
            }
        };

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }

        let exchange = async {
            let mut response = request.send().await.map_err(fail)?;
            let status = response.status();
            let mut bytes = Vec::new();
            let mut truncated = false;
            while let Some(chunk) = response.chunk().await.map_err(fail)? {
                let room = self.max_response_size.saturating_sub(bytes.len());
                if chunk.len() > room {
                    bytes.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    break;
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok::<_, ToolError>((status, bytes, truncated))
        };
        let (status, bytes, truncated) =
            tokio::time::timeout(Duration::from_millis(timeout_ms), exchange)
                .await
                .map_err(|_| timeout_error(timeout_ms))??;

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if truncated {
            text.push_str(RESPONSE_TRUNCATION_MARKER);
        }
        debug!(status = status.as_u16(), bytes = bytes.len(), truncated, "Fetched URL");

        if status.is_success() {
            Ok(ToolResult::success(text))
        } else {
            Ok(ToolResult::failure_with_output(
                &ToolError::HttpStatus(status.as_u16()),
                text,
            ))
        }
    }
}

fn timeout_error(timeout_ms: u64) -> ToolError {
    ToolError::Timeout {
        operation: "Request".into(),
        timeout_ms,
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new(&WebFetchConfig::default())
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP(S) and return the response body."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("url", "string", "http:// or https:// URL"),
            ToolParameter::optional("method", "string", "GET or POST").with_default("GET"),
            ToolParameter::optional("body", "string", "Request body for POST"),
            ToolParameter::optional("timeout", "integer", "Timeout in milliseconds")
                .with_default(self.timeout_ms.to_string()),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let raw = args.require("url")?.trim();
        let url = Url::parse(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid URL '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let method = match args.get_or("method", "GET").trim().to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "unsupported method {other}; use GET or POST"
                )));
            }
        };
        let timeout_ms: u64 = args.parse_or("timeout", self.timeout_ms)?;
        let body = args.get("body").map(str::to_string);

        debug!(url = %url, method = %method, "Fetching URL");
        self.fetch(method, url, body, timeout_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::ErrorKind;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi there"))
            .mount(&server)
            .await;

        let url = format!("{}/hello", server.uri());
        let result = WebFetchTool::default()
            .execute(&args(&[("url", url.as_str())]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hi there");
    }

    #[tokio::test]
    async fn post_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let url = format!("{}/submit", server.uri());
        let result = WebFetchTool::default()
            .execute(&args(&[("url", url.as_str()), ("method", "post"), ("body", "payload")]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "created");
    }

    #[tokio::test]
    async fn error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
            .mount(&server)
            .await;

        let result = WebFetchTool::default()
            .execute(&args(&[("url", server.uri().as_str())]))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP 404"));
        assert_eq!(result.output, "no such page");
    }

    #[tokio::test]
    async fn large_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("z".repeat(10_000)))
            .mount(&server)
            .await;

        let tool = WebFetchTool::new(&WebFetchConfig {
            max_response_size: 100,
            ..WebFetchConfig::default()
        });
        let result = tool.execute(&args(&[("url", server.uri().as_str())])).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.output,
            format!("{}{RESPONSE_TRUNCATION_MARKER}", "z".repeat(100))
        );
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = WebFetchTool::default()
            .execute(&args(&[("url", server.uri().as_str()), ("timeout", "200")]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = WebFetchTool::default()
            .execute(&args(&[("url", "file:///etc/passwd")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
