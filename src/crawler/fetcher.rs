//! Fetch executor
//!
//! This module performs one fetch of a URL, including its retries:
//! - A `Transport` abstraction over the wire (reqwest in production)
//! - User-agent rotation from an identity pool
//! - Classification of each attempt as success, transient or fatal
//! - Backoff sleeps between attempts that honour cancellation
//!
//! A failed URL is reported as a value, never as an error: the crawl always
//! moves on to the next frontier item.

use crate::config::{Config, ContentExpectation, IdentityConfig};
use crate::crawler::retry::RetryPolicy;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::{header, redirect::Policy, Client};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One request handed to a transport
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    pub url: &'a Url,
    pub user_agent: &'a str,
    pub timeout: Duration,
}

/// What a transport got back
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Final URL after redirects
    pub final_url: Url,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Response body (empty for non-2xx responses)
    pub body: Vec<u8>,
}

/// Network-level failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Other => "network",
        };
        f.write_str(name)
    }
}

/// A request that never produced a response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

/// The wire used by the fetch executor
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET request
    async fn get(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Builds the HTTP client shared by every fetch
///
/// The user agent is set per request so the identity pool can rotate it.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(request.url.clone())
            .header(header::USER_AGENT, request.user_agent)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if status.is_success() {
            response
                .bytes()
                .await
                .map_err(classify_reqwest_error)?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            body,
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError {
        kind,
        message: error.to_string(),
    }
}

/// User-agent strings rotated per attempt
#[derive(Debug, Clone)]
pub struct IdentityPool {
    agents: Vec<String>,
}

impl IdentityPool {
    /// Creates a pool; an empty list falls back to a generic identity
    pub fn new(agents: Vec<String>) -> Self {
        if agents.is_empty() {
            return Self {
                agents: vec![format!("crawl-frontier/{}", env!("CARGO_PKG_VERSION"))],
            };
        }
        Self { agents }
    }

    /// Builds the pool from the `[identity]` section
    ///
    /// Format of the crawler identity: `Name/Version (+ContactURL)`
    pub fn from_config(config: &IdentityConfig) -> Self {
        if !config.rotate.is_empty() {
            return Self::new(config.rotate.clone());
        }

        let identity = match &config.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                config.crawler_name, config.crawler_version, contact
            ),
            None => format!("{}/{}", config.crawler_name, config.crawler_version),
        };
        Self::new(vec![identity])
    }

    /// Picks an identity uniformly at random
    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }
}

impl ContentExpectation {
    /// Checks a Content-Type header value against this expectation
    pub fn accepts(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        match self {
            Self::Any => true,
            Self::Html => {
                content_type.contains("text/html") || content_type.contains("application/xhtml")
            }
            Self::Image => content_type.trim_start().starts_with("image/"),
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Why an attempt (or a whole fetch) failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Network(TransportError),

    #[error("expected {expected:?} content, got '{actual}'")]
    ContentMismatch {
        expected: ContentExpectation,
        actual: String,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FailureReason>,
    },
}

/// Outcome of a single attempt
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success(FetchedPage),
    /// Worth retrying: network errors and non-2xx statuses
    TransientFailure(FailureReason),
    /// Retrying will not help
    FatalFailure(FailureReason),
}

/// One attempt at a URL; exists only while the fetch is running
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub url: Url,
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

/// Terminal outcome of a fetch, after all retries
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(FetchedPage),
    FatalFailure(FailureReason),
    /// Cancelled while in flight
    Aborted,
}

/// What the executor hands back to the orchestrator
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub url: Url,
    /// Attempts actually issued
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

/// Performs fetches with retry and backoff
///
/// Holds no state across calls beyond its configuration.
pub struct FetchExecutor {
    transport: Arc<dyn Transport>,
    identities: IdentityPool,
    policy: RetryPolicy,
    timeout: Duration,
    expect: ContentExpectation,
}

impl FetchExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        identities: IdentityPool,
        policy: RetryPolicy,
        timeout: Duration,
        expect: ContentExpectation,
    ) -> Self {
        Self {
            transport,
            identities,
            policy,
            timeout,
            expect,
        }
    }

    /// Builds an executor over the given transport from configuration
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            transport,
            IdentityPool::from_config(&config.identity),
            RetryPolicy::from_config(&config.fetch),
            Duration::from_millis(config.fetch.timeout_ms),
            config.fetch.expect,
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issues a single attempt and classifies the result
    pub async fn attempt(&self, url: &Url, attempt_number: u32) -> FetchAttempt {
        let request = TransportRequest {
            url,
            user_agent: self.identities.pick(),
            timeout: self.timeout,
        };

        let outcome = match self.transport.get(request).await {
            Err(error) => AttemptOutcome::TransientFailure(FailureReason::Network(error)),
            Ok(response) if !(200..300).contains(&response.status) => {
                AttemptOutcome::TransientFailure(FailureReason::Status(response.status))
            }
            Ok(response) => match &response.content_type {
                Some(content_type) if !self.expect.accepts(content_type) => {
                    AttemptOutcome::FatalFailure(FailureReason::ContentMismatch {
                        expected: self.expect,
                        actual: content_type.clone(),
                    })
                }
                _ => AttemptOutcome::Success(FetchedPage {
                    url: response.final_url,
                    status: response.status,
                    content_type: response.content_type,
                    body: response.body,
                }),
            },
        };

        FetchAttempt {
            url: url.clone(),
            attempt_number,
            outcome,
        }
    }

    /// Fetches a URL, retrying transient failures per the retry policy
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx, expected content type | Success |
    /// | 2xx, other content type | Immediate → FatalFailure |
    /// | non-2xx status | Retry with backoff |
    /// | network error / timeout | Retry with backoff |
    /// | final attempt fails transiently | FatalFailure(RetriesExhausted) |
    /// | cancellation | Aborted |
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> FetchReport {
        let mut attempt_number = 0;

        loop {
            attempt_number += 1;

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.report(url, attempt_number - 1, FetchOutcome::Aborted);
                }
                attempt = self.attempt(url, attempt_number) => attempt,
            };

            match attempt.outcome {
                AttemptOutcome::Success(page) => {
                    if attempt_number > 1 {
                        tracing::info!(url = %url, attempts = attempt_number, "Fetch succeeded after retry");
                    }
                    return self.report(url, attempt_number, FetchOutcome::Success(page));
                }
                AttemptOutcome::FatalFailure(reason) => {
                    tracing::warn!(url = %url, attempt = attempt_number, error = %reason, "Fetch failed permanently");
                    return self.report(url, attempt_number, FetchOutcome::FatalFailure(reason));
                }
                AttemptOutcome::TransientFailure(reason) => {
                    if !self.policy.has_attempts_left(attempt_number) {
                        tracing::warn!(
                            url = %url,
                            attempts = attempt_number,
                            error = %reason,
                            "Fetch failed after all attempts exhausted"
                        );
                        let exhausted = FailureReason::RetriesExhausted {
                            attempts: attempt_number,
                            last: Box::new(reason),
                        };
                        return self.report(
                            url,
                            attempt_number,
                            FetchOutcome::FatalFailure(exhausted),
                        );
                    }

                    let delay = self.policy.delay_for(attempt_number);
                    tracing::debug!(
                        url = %url,
                        attempt = attempt_number,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Fetch attempt failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return self.report(url, attempt_number, FetchOutcome::Aborted);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn report(&self, url: &Url, attempts: u32, outcome: FetchOutcome) -> FetchReport {
        FetchReport {
            url: url.clone(),
            attempts,
            outcome,
        }
    }
}
