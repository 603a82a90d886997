//! `GetHTML`: download a page and decode it whatever its declared charset.

use super::{OperationHandler, OperationRegistry, Signature, SlotSpec, StepContext, StepOutcome};
use crate::config::HttpConfig;
use crate::encoding::{charset_from_content_type, decode_html};
use crate::procedure::ArgKind;
use crate::AutomationError;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub(super) fn register(registry: &mut OperationRegistry) {
    registry.register(
        "GetHTML",
        Signature::one(SlotSpec::on(ArgKind::Var)),
        Arc::new(GetHtml),
    );
}

/// Shared HTTP client with the configured User-Agent and timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, AutomationError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and decodes the body. Non-success statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String, AutomationError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = response.bytes().await?;
        debug!(
            "fetched {} bytes, header charset {:?}",
            bytes.len(),
            charset
        );
        Ok(decode_html(&bytes, charset.as_deref()))
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[derive(Debug, Default)]
pub struct GetHtml;

#[async_trait::async_trait]
impl OperationHandler for GetHtml {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let Some(url) = step.arg1().filter(|u| !u.trim().is_empty()) else {
            return StepOutcome::status("(no url)");
        };
        if !is_http_url(&url) {
            return StepOutcome::status("(invalid url)");
        }
        match step.services.http.fetch_html(url.trim()).await {
            Ok(html) => StepOutcome::same(html),
            Err(e) => {
                warn!("GetHTML {} failed: {}", url, e);
                StepOutcome::status(format!("(error: {e})"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_schemes_are_fetched() {
        assert!(is_http_url("HTTPS://example.org"));
        assert!(is_http_url("http://10.0.0.1/report"));
        assert!(!is_http_url("file:///c:/report.html"));
        assert!(!is_http_url("example.org"));
    }
}
