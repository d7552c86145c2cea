#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Client for the analytics insights API.
//!
//! The upstream service takes a quarter and a year and answers with the
//! per-slide metrics tree decoded by `qdeck_core::metrics`. Responses
//! can take minutes to compute, so the request timeout is generous, and
//! transient failures (unreachable endpoint, 5xx) are retried with
//! exponential backoff. Client-side rejections and undecodable bodies
//! are terminal.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use qdeck_core::{Error, FiscalQuarter, InsightsReport, InsightsSource, Result};
use serde::Serialize;
use std::time::Duration;

/// Default per-request timeout, matching how long the upstream model
/// run is allowed to take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Retries attempted on top of the initial request.
const MAX_RETRIES: usize = 3;

/// Request body the insights endpoint expects.
///
/// Both fields are strings on the wire; the endpoint does not accept
/// JSON numbers.
#[derive(Debug, Serialize)]
struct InsightsQuery {
    quarter_no: String,
    year_no: String,
}

impl From<FiscalQuarter> for InsightsQuery {
    fn from(quarter: FiscalQuarter) -> Self {
        Self {
            quarter_no: quarter.quarter().to_string(),
            year_no: quarter.year().to_string(),
        }
    }
}

/// One failed fetch attempt, tagged with whether retrying can help.
struct FetchFailure {
    error: Error,
    transient: bool,
}

impl FetchFailure {
    fn transient(error: Error) -> Self {
        Self {
            error,
            transient: true,
        }
    }

    fn terminal(error: Error) -> Self {
        Self {
            error,
            transient: false,
        }
    }
}

/// HTTP client for the insights endpoint.
///
/// Implements [`InsightsSource`], so the worker pipeline and the tests'
/// mock are interchangeable.
pub struct InsightsClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl InsightsClient {
    /// Creates a client posting to `endpoint`.
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the endpoint this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_once(
        &self,
        query: &InsightsQuery,
    ) -> std::result::Result<InsightsReport, FetchFailure> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(query)
            .send()
            .await
            .map_err(|e| {
                FetchFailure::transient(Error::insights_with_source(
                    "insights request failed",
                    e,
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = Error::insights(format!("insights API answered HTTP {status}: {body}"));
            return Err(if status.is_server_error() {
                FetchFailure::transient(error)
            } else {
                FetchFailure::terminal(error)
            });
        }

        response.json::<InsightsReport>().await.map_err(|e| {
            FetchFailure::terminal(Error::insights_with_source(
                "insights response decode failed",
                e,
            ))
        })
    }
}

#[async_trait]
impl InsightsSource for InsightsClient {
    async fn fetch(&self, quarter: FiscalQuarter) -> Result<InsightsReport> {
        let query = InsightsQuery::from(quarter);
        tracing::info!(
            endpoint = %self.endpoint,
            quarter = %quarter,
            "Fetching insights report"
        );

        let report = (|| self.fetch_once(&query))
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .when(|failure: &FetchFailure| failure.transient)
            .notify(|failure: &FetchFailure, after: Duration| {
                tracing::warn!(
                    error = %failure.error,
                    retry_in_ms = after.as_millis() as u64,
                    "Insights fetch failed, retrying"
                );
            })
            .await
            .map_err(|failure| failure.error)?;

        tracing::info!(
            quarter = %quarter,
            slides = report.len(),
            "Insights report received"
        );
        Ok(report)
    }
}
