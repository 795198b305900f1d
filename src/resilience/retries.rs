//! Bounded retry helpers.
//!
//! # Design Decisions
//! - Attempts are capped; exhaustion is reported, never escalated
//! - Attempt count of zero is treated as one

use std::future::Future;

use crate::resilience::backoff::Backoff;

/// Run `op` until it reports success or `attempts` tries are used up.
///
/// `op` receives the 1-based attempt number. Returns whether any attempt succeeded.
pub async fn retry_until<F, Fut>(attempts: u32, backoff: Backoff, mut op: F) -> bool
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if op(attempt).await {
            return true;
        }
        if attempt < attempts {
            sleep(backoff.delay(attempt)).await;
        }
    }
    false
}

/// Like [`retry_until`] for fallible operations; returns the last error on exhaustion.
pub async fn retry<T, E, F, Fut>(attempts: u32, backoff: Backoff, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = backoff.delay(attempt);
                tracing::debug!(attempt, error = %e, delay = ?delay, "Attempt failed, retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn sleep(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let ok = retry_until(3, Backoff::None, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { attempt == 2 }
        })
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let ok = retry_until(3, Backoff::None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let result: Result<(), String> =
            retry(3, Backoff::Fixed(Duration::from_secs(10)), |n| async move {
                Err(format!("attempt {} failed", n))
            })
            .await;
        assert_eq!(result, Err("attempt 3 failed".to_string()));
        // two waits between three attempts, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        retry_until(0, Backoff::None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
