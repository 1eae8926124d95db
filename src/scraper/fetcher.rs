//! HTTP fetch primitives
//!
//! This module provides the two building blocks every other component fetches
//! through:
//! - a shared HTTP client with a bounded keep-alive pool
//! - `fetch_with_retry`, a bounded-retry GET that resolves to an explicit
//!   failure value instead of an error once its attempts are exhausted
//!
//! The shared concurrency gate is applied in `gated_fetch`: one permit per
//! in-flight request, for link pages, detail pages, and phone-reveal calls
//! alike. This is the only backpressure mechanism in the system.

use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// Browser-like user agent; the catalog serves an HTML challenge to obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Builds the HTTP client shared by every fetch in the process
///
/// # Arguments
///
/// * `max_connections` - Upper bound on idle keep-alive connections per host,
///   matched to the concurrency gate capacity
pub fn build_http_client(max_connections: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(max_connections)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Why a fetch was given up on after exhausting its retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// The URL that could not be fetched
    pub url: String,

    /// Total attempts performed (`max_retries + 1`)
    pub attempts: u32,

    /// Description of the last transport error or bad status
    pub last_error: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempts: {}",
            self.url, self.attempts, self.last_error
        )
    }
}

/// Fetches a URL with bounded retries and a fixed inter-attempt delay
///
/// A transport error, timeout, or non-2xx status all count as a failed
/// attempt. After `max_retries` additional attempts the failure is returned as
/// a value; no error ever propagates past this boundary.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    max_retries: u32,
    delay: Duration,
) -> Result<String, FetchFailure> {
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            sleep(delay).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => last_error = format!("body read failed: {}", e),
                    }
                } else {
                    last_error = format!("HTTP {}", status);
                }
            }
            Err(e) if e.is_timeout() => last_error = "request timeout".to_string(),
            Err(e) if e.is_connect() => last_error = "connection failed".to_string(),
            Err(e) => last_error = e.to_string(),
        }

        tracing::debug!(
            "Fetch attempt {}/{} failed for {}: {}",
            attempt + 1,
            max_retries + 1,
            url,
            last_error
        );
    }

    Err(FetchFailure {
        url: url.to_string(),
        attempts: max_retries + 1,
        last_error,
    })
}

/// Fetches through the shared concurrency gate
///
/// One permit is acquired before dispatch and held until the request (and all
/// of its retries) completes, regardless of outcome.
pub async fn gated_fetch(
    client: &Client,
    gate: Arc<Semaphore>,
    url: &str,
    max_retries: u32,
    delay: Duration,
) -> Result<String, FetchFailure> {
    // The gate lives as long as the run, so acquisition only fails if the
    // semaphore was closed; treat that as a failed unit rather than panic.
    let _permit = match gate.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return Err(FetchFailure {
                url: url.to_string(),
                attempts: 0,
                last_error: "concurrency gate closed".to_string(),
            })
        }
    };

    fetch_with_retry(client, url, max_retries, delay).await
}
