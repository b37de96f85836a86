//! Check roster and example probes.
//!
//! Edit [`all`] to choose which checks the daemon runs.

use async_trait::async_trait;
use checkmon::{Analyzer, Check, CheckResult, Priority};
use common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// All registered checks.
pub fn all() -> Result<Vec<Arc<dyn Check>>> {
    // Examples:
    //
    // Ok(vec![
    //     Arc::new(WebsiteUpCheck::new("https://example.com")?),
    //     Arc::new(PriceThresholdCheck::new(100_000.0)?),
    //     Arc::new(DocumentWatchCheck::new(
    //         "court-case-123456",
    //         "https://court.example.gov/cases.pdf",
    //         "Find case 123456 in this PDF. If the 'Ready for Pickup' \
    //          column has an X for it, respond with exactly: YES. \
    //          Otherwise respond with exactly: NO. Say nothing else.",
    //         "Case Ready!",
    //         "Case 123456 is ready for pickup",
    //     )?),
    // ])
    Ok(Vec::new())
}

/// Monitors website availability. Alerts when the site is unreachable
/// or returns a server error.
pub struct WebsiteUpCheck {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebsiteUpCheck {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let name = format!(
            "website-{}",
            url.trim_start_matches("https://")
                .trim_start_matches("http://")
                .replace('/', "-")
        );
        Ok(Self {
            name,
            url,
            client: probe_client(Duration::from_secs(10))?,
        })
    }
}

#[async_trait]
impl Check for WebsiteUpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        _analyzer: Option<&Analyzer>,
    ) -> Result<CheckResult> {
        let response = tokio::select! {
            response = self.client.get(&self.url).send() => response,
            _ = cancel.cancelled() => return Err(Error::check("check cancelled")),
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return Ok(CheckResult::alert(
                    "Site Down",
                    format!("{} is not responding: {e}", self.url),
                )
                .with_priority(Priority::High));
            }
        };

        if response.status().is_server_error() {
            return Ok(CheckResult::alert(
                "Site Error",
                format!("{} returned status {}", self.url, response.status().as_u16()),
            )
            .with_priority(Priority::High));
        }

        Ok(CheckResult::ok())
    }
}

const PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Monitors the Bitcoin price against a threshold.
pub struct PriceThresholdCheck {
    threshold: f64,
    client: reqwest::Client,
}

impl PriceThresholdCheck {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            threshold,
            client: probe_client(Duration::from_secs(10))?,
        })
    }
}

#[async_trait]
impl Check for PriceThresholdCheck {
    fn name(&self) -> &str {
        "btc-price"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(10 * 60)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        _analyzer: Option<&Analyzer>,
    ) -> Result<CheckResult> {
        let response = tokio::select! {
            response = self.client.get(PRICE_URL).send() => response,
            _ = cancel.cancelled() => return Err(Error::check("check cancelled")),
        };
        let response = response.map_err(|e| Error::check(format!("fetch price: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::check(format!("parse price: {e}")))?;
        let price = body["bitcoin"]["usd"]
            .as_f64()
            .ok_or_else(|| Error::check("price missing from response"))?;

        if price > self.threshold {
            return Ok(CheckResult::alert(
                "BTC Alert",
                format!("Bitcoin is at ${price:.2} (above ${:.2})", self.threshold),
            )
            .with_tags(["crypto", "btc"])
            .with_metadata("price", format!("{price:.2}"))
            .with_metadata("threshold", format!("{:.2}", self.threshold)));
        }

        Ok(CheckResult::ok())
    }
}

/// Fetches a document and asks the analyzer a yes/no question about
/// it. Alerts when the answer is affirmative.
pub struct DocumentWatchCheck {
    name: String,
    url: String,
    prompt: String,
    title: String,
    message: String,
    client: reqwest::Client,
}

impl DocumentWatchCheck {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        prompt: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            url: url.into(),
            prompt: prompt.into(),
            title: title.into(),
            message: message.into(),
            client: probe_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl Check for DocumentWatchCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        analyzer: Option<&Analyzer>,
    ) -> Result<CheckResult> {
        let Some(analyzer) = analyzer else {
            return Err(Error::check("analyzer required for this check"));
        };

        let response = tokio::select! {
            response = self.client.get(&self.url).send() => response,
            _ = cancel.cancelled() => return Err(Error::check("check cancelled")),
        };
        let response = response.map_err(|e| Error::check(format!("fetch document: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::check(format!("fetch document: HTTP {status}")));
        }
        let document = response
            .bytes()
            .await
            .map_err(|e| Error::check(format!("read document: {e}")))?;

        let answer = analyzer.analyze(cancel, &self.prompt, &document).await?;

        if answer.trim().starts_with("YES") {
            return Ok(CheckResult::alert(self.title.clone(), self.message.clone())
                .with_priority(Priority::High));
        }

        Ok(CheckResult::ok())
    }
}

fn probe_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::check(format!("build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_check_name_derivation() {
        let check = WebsiteUpCheck::new("https://example.com/status/page").unwrap();
        assert_eq!(check.name(), "website-example.com-status-page");

        let check = WebsiteUpCheck::new("http://example.org").unwrap();
        assert_eq!(check.name(), "website-example.org");
    }

    #[tokio::test]
    async fn test_document_watch_requires_analyzer() {
        let check = DocumentWatchCheck::new(
            "doc-watch",
            "https://example.com/doc.pdf",
            "is it ready?",
            "Ready",
            "the document is ready",
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let result = check.run(&cancel, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_website_check_alerts_when_unreachable() {
        // Nothing listens on this port; the probe reports the site down
        // rather than failing the execution.
        let check = WebsiteUpCheck::new("http://127.0.0.1:1/health").unwrap();
        let cancel = CancellationToken::new();

        let result = check.run(&cancel, None).await.unwrap();
        assert!(result.should_alert);
        assert_eq!(result.title, "Site Down");
        assert_eq!(result.priority, Priority::High);
    }
}
