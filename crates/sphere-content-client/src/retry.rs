//! Backoff for pinning uploads.
//!
//! A request is retried only when it never produced a response: the
//! connection was refused or reset, or it timed out. Any HTTP status,
//! 5xx included, goes straight back to the caller.

use std::future::Future;
use std::time::Duration;

/// Wait before each retry.
pub(crate) const BACKOFF: [Duration; 3] = [
    Duration::from_millis(200),
    Duration::from_millis(400),
    Duration::from_millis(800),
];

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Call `send` until it yields a response, a non-transient error, or the
/// schedule runs out.
///
/// `send` must build a fresh request each call; multipart bodies cannot be
/// replayed.
pub(crate) async fn retry_send<F, Fut>(mut send: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut schedule = BACKOFF.iter();
    loop {
        match send().await {
            Err(e) if is_transient(&e) => {
                let Some(delay) = schedule.next() else {
                    return Err(e);
                };
                tracing::warn!(error = %e, retry_in = ?delay, "pinning request failed");
                tokio::time::sleep(*delay).await;
            }
            other => return other,
        }
    }
}
