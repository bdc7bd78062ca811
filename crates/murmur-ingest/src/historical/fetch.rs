//! Single-page fetch with timeout and bounded retries.

use crate::config::ReaderConfig;
use crate::normalize::RawItem;
use crate::upstream::{SearchRequest, UpstreamClient};
use crate::{Error, Result};
use metrics::counter;
use std::time::Duration;

/// Fetch one search page.
///
/// Each attempt is bounded by `fetch_timeout`. A failed attempt is retried up
/// to `fetch_retries` times, sleeping `retry_backoff` before the first retry
/// and doubling it each time. The error of the last attempt is returned.
pub async fn fetch_page(
    client: &dyn UpstreamClient,
    request: &SearchRequest,
    config: &ReaderConfig,
) -> Result<Vec<RawItem>> {
    let mut backoff = config.retry_backoff;
    let mut attempt = 0u32;

    loop {
        let result = match tokio::time::timeout(config.fetch_timeout, client.search(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(config.fetch_timeout)),
        };

        let err = match result {
            Ok(page) => return Ok(page),
            Err(err) => err,
        };

        counter!("historical_fetch_errors_total").increment(1);
        if attempt >= config.fetch_retries {
            tracing::error!(
                attempts = attempt + 1,
                "search failed, giving up: {}",
                err
            );
            return Err(err);
        }

        attempt += 1;
        tracing::warn!(
            attempt,
            max_retries = config.fetch_retries,
            "search failed, retrying in {:?}: {}",
            backoff,
            err
        );
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2).min(Duration::from_secs(60));
    }
}
