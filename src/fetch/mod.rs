mod retry;

pub use retry::{is_transport_level, with_retry, Backoff, RetryPolicy};

use anyhow::Result;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Hard per-attempt timeout for structured (JSON) calls.
pub const JSON_TIMEOUT: Duration = Duration::from_secs(15);
/// Bound on the diagnostic payload carried by a malformed result.
pub const MALFORMED_PREFIX_LEN: usize = 200;
/// Hop cap for manual redirect following.
pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Outcome of a structured fetch. Exactly one variant; a malformed response
/// carries a bounded diagnostic prefix instead of the full body.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Json(serde_json::Value),
    Malformed { status: u16, body_prefix: String },
}

impl FetchResult {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            FetchResult::Json(v) => Some(v),
            FetchResult::Malformed { .. } => None,
        }
    }
}

/// Process-wide HTTP client. Holds two keep-alive connection pools: one that
/// lets reqwest resolve redirects for API calls, and one with redirects
/// disabled so page fetches can follow Location headers manually.
pub struct Fetcher {
    pooled: reqwest::Client,
    bare: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let pooled = reqwest::Client::builder().build()?;
        let bare = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { pooled, bare })
    }

    /// GET a JSON endpoint. Content-type mismatches come back as
    /// `Malformed` (never retried); transport failures and timeouts
    /// propagate for the retry wrapper.
    pub async fn fetch_json(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .pooled
            .get(url)
            .timeout(JSON_TIMEOUT)
            .send()
            .await
            .map_err(FetchError::from)?;
        Self::read_json_response(response).await
    }

    /// POST a JSON body with the same result semantics as `fetch_json`.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<FetchResult, FetchError> {
        let mut request = self.pooled.post(url).timeout(JSON_TIMEOUT).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(FetchError::from)?;
        Self::read_json_response(response).await
    }

    async fn read_json_response(response: reqwest::Response) -> Result<FetchResult, FetchError> {
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json") || ct.contains("+json"))
            .unwrap_or(false);

        if is_json {
            let value = response
                .json::<serde_json::Value>()
                .await
                .map_err(FetchError::from)?;
            Ok(FetchResult::Json(value))
        } else {
            let body = response.text().await.map_err(FetchError::from)?;
            let body_prefix: String = body.chars().take(MALFORMED_PREFIX_LEN).collect();
            Ok(FetchResult::Malformed {
                status,
                body_prefix,
            })
        }
    }

    /// `fetch_json` with the default linear-backoff policy.
    pub async fn fetch_json_with_retry(
        &self,
        url: &str,
        max_attempts: u32,
    ) -> Result<FetchResult, FetchError> {
        self.fetch_json_with_policy(url, &RetryPolicy::new(max_attempts))
            .await
    }

    pub async fn fetch_json_with_policy(
        &self,
        url: &str,
        policy: &RetryPolicy,
    ) -> Result<FetchResult, FetchError> {
        with_retry(policy, || self.fetch_json(url)).await
    }

    /// Fetch a page for rendering. The per-request timeout is soft (empty
    /// body); losing the outer race or any transport failure synthesizes an
    /// HTML error payload so callers always get renderable content.
    pub async fn fetch_rendered(
        &self,
        url: &str,
        page_timeout: Duration,
        outer_timeout: Duration,
    ) -> String {
        match tokio::time::timeout(outer_timeout, self.fetch_html(url, page_timeout)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::error!("error fetching {url}: {e}");
                synthesized_error_page(&e.to_string())
            }
            Err(_) => {
                let message = format!(
                    "Fetching {} timed out after {}ms",
                    url,
                    outer_timeout.as_millis()
                );
                tracing::error!("{message}");
                synthesized_error_page(&message)
            }
        }
    }

    async fn fetch_html(&self, url: &str, per_request_timeout: Duration) -> Result<String> {
        let mut current = Url::parse(url)?;

        for _ in 0..MAX_REDIRECTS {
            let response = match self
                .bare
                .get(current.clone())
                .timeout(per_request_timeout)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return Ok(String::new()),
                Err(e) => return Err(e.into()),
            };

            if response.status().is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    current = current.join(location)?;
                    continue;
                }
            }

            return match response.text().await {
                Ok(body) => Ok(body),
                Err(e) if e.is_timeout() => Ok(String::new()),
                Err(e) => Err(e.into()),
            };
        }

        anyhow::bail!("redirect limit of {MAX_REDIRECTS} exceeded for {url}")
    }
}

fn synthesized_error_page(message: &str) -> String {
    format!("<html><body>Error fetching content: {message}</body></html>")
}

/// Percent-encode whitespace so user-supplied URLs survive a GET line.
pub fn sanitize_url(url: &str) -> String {
    url.split_whitespace().collect::<Vec<_>>().join("%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_url_encodes_spaces() {
        assert_eq!(
            sanitize_url("https://example.com/a page"),
            "https://example.com/a%20page"
        );
        assert_eq!(sanitize_url("https://example.com/x"), "https://example.com/x");
    }

    #[test]
    fn malformed_result_is_never_json() {
        let result = FetchResult::Malformed {
            status: 429,
            body_prefix: "rate limited".to_string(),
        };
        assert!(result.as_json().is_none());
    }

    #[test]
    fn synthesized_page_is_renderable_html() {
        let page = synthesized_error_page("boom");
        assert!(page.starts_with("<html>"));
        assert!(page.contains("Error fetching content: boom"));
    }
}
