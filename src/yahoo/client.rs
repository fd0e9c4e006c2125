//! Yahoo Finance client for fetching daily chart history
//!
//! Features:
//! - Inclusive calendar-date ranges mapped to the chart API's epoch bounds
//! - Automatic retry with exponential backoff
//!
//! # Example
//! ```no_run
//! use inside_day_breakout::yahoo::YahooClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = YahooClient::new()?;
//!     let bars = client.get_daily_bars("RELIANCE.NS", None, None).await?;
//!     println!("Fetched {} bars", bars.len());
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::types::ChartResponse;
use crate::Bar;

/// Base URL for the Yahoo Finance chart API
pub const CHART_API_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// The chart endpoint rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Request timeout duration
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Yahoo Finance API client
#[derive(Debug, Clone)]
pub struct YahooClient {
    http_client: Client,
    max_retries: u32,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            max_retries: config.max_retries,
        })
    }

    /// Execute a request, retrying with exponential backoff
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s...
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                debug!("Retrying after {}ms", delay.as_millis());
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {:#}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed with no attempts")))
    }

    /// Fetch daily bars for `symbol` over an inclusive date range
    ///
    /// A missing `start` reaches back to the first listed day; a missing
    /// `end` runs to today.
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>> {
        let url = format!("{}/{}", CHART_API_BASE, symbol);
        let period1 = start.map_or(0, epoch_seconds);
        // period2 is exclusive, so step one day past the inclusive end
        let period2 = end
            .and_then(|e| e.checked_add_days(Days::new(1)))
            .map_or_else(|| Utc::now().timestamp(), epoch_seconds);

        let params = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];

        debug!(
            "Fetching chart: symbol={}, period1={}, period2={}",
            symbol, period1, period2
        );

        let response: ChartResponse = self
            .execute_with_retry(|| {
                let client = self.http_client.clone();
                let url = url.clone();
                let params = params.clone();

                async move {
                    let response = client
                        .get(&url)
                        .query(&params)
                        .send()
                        .await
                        .context("Failed to send request to Yahoo Finance")?;

                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        anyhow::bail!("Yahoo Finance API error {}: {}", status, body);
                    }

                    response
                        .json::<ChartResponse>()
                        .await
                        .context("Failed to parse Yahoo Finance response")
                }
            })
            .await?;

        if let Some(error) = response.chart.error {
            anyhow::bail!("Yahoo Finance error for {}: {} ({})", symbol, error.description, error.code);
        }

        let bars: Vec<Bar> = response
            .chart
            .result
            .iter()
            .flatten()
            .flat_map(|result| result.to_bars())
            .collect();

        info!("Fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::default()
            .with_max_retries(5)
            .with_timeout(Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(YahooClient::with_config(config).is_ok());
    }

    #[test]
    fn test_epoch_seconds() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 3).unwrap();
        assert_eq!(epoch_seconds(date), 1_672_704_000);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let client = YahooClient::with_config(ClientConfig::default().with_max_retries(0)).unwrap();
        let calls = std::sync::atomic::AtomicU32::new(0);

        let result: Result<()> = client
            .execute_with_retry(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(anyhow!("boom")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
