//! Waiting out eventual consistency
//!
//! Objects created through the API are not always readable right away.
//! `poll_until_success` retries a read with exponential backoff until it
//! succeeds, the deadline passes or the request context is cancelled.

use std::future::Future;
use std::time::{Duration, Instant};
use tfplug::Context;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(16),
            multiplier: 2.0,
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("gave up after {attempts} attempts in {elapsed:?}: {source}")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: E,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Call `f` until it succeeds
///
/// The deadline is the earlier of `config.timeout` and the context deadline.
/// After the deadline passes the last error is returned inside
/// `PollError::Timeout`; cancellation of `ctx` ends the loop immediately,
/// including during a sleep or an in-flight call.
pub async fn poll_until_success<T, E, F, Fut>(
    ctx: &Context,
    config: &PollConfig,
    mut f: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    // A timeout too large to represent leaves only the context deadline
    let deadline = match (start.checked_add(config.timeout), ctx.deadline()) {
        (Some(own), Some(ctx_deadline)) => Some(own.min(ctx_deadline)),
        (own, ctx_deadline) => own.or(ctx_deadline),
    };

    let mut interval = config.initial_interval;
    let mut attempts = 0;

    loop {
        if ctx.is_cancelled() {
            return Err(PollError::Cancelled { attempts });
        }

        attempts += 1;
        let result = tokio::select! {
            result = f() => result,
            _ = ctx.cancelled() => return Err(PollError::Cancelled { attempts }),
        };

        let err = match result {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!("Poll succeeded after {} attempts", attempts);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let now = Instant::now();
        let wait = match deadline {
            Some(deadline) if now >= deadline => {
                tracing::warn!("Giving up polling after {} attempts: {}", attempts, err);
                return Err(PollError::Timeout {
                    attempts,
                    elapsed: start.elapsed(),
                    source: err,
                });
            }
            Some(deadline) => interval.min(deadline - now),
            None => interval,
        };
        tracing::debug!(
            "Poll attempt {} failed ({}), retrying in {:?}",
            attempts,
            err,
            wait
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = ctx.cancelled() => return Err(PollError::Cancelled { attempts }),
        }

        interval = interval.mul_f64(config.multiplier).min(config.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(timeout: Duration) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            multiplier: 2.0,
            timeout,
        }
    }

    #[tokio::test]
    async fn returns_after_function_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = poll_until_success(
            &Context::new(),
            &fast_config(Duration::from_secs(5)),
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= 3 {
                        Err(format!("not yet ({})", n))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_when_function_keeps_failing() {
        let result: Result<(), _> = poll_until_success(
            &Context::new(),
            &fast_config(Duration::from_millis(60)),
            || async { Err::<(), _>("still missing") },
        )
        .await;

        match result {
            Err(PollError::Timeout {
                attempts, source, ..
            }) => {
                assert!(attempts >= 2);
                assert_eq!(source, "still missing");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn context_deadline_bounds_the_poll() {
        let ctx = Context::new().with_timeout(Duration::from_millis(40));
        let start = Instant::now();

        let result = poll_until_success(&ctx, &fast_config(Duration::from_secs(60)), || async {
            Err::<(), _>("nope")
        })
        .await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_stops_a_sleeping_poll() {
        let ctx = Context::new();
        let config = PollConfig {
            initial_interval: Duration::from_secs(30),
            ..fast_config(Duration::from_secs(60))
        };

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = poll_until_success(&ctx, &config, || async { Err::<(), _>("nope") }).await;

        assert!(matches!(result, Err(PollError::Cancelled { attempts: 1 })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancelled_context_never_calls_function() {
        let ctx = Context::new();
        ctx.cancel();

        let result = poll_until_success(&ctx, &PollConfig::default(), || async {
            Ok::<_, String>(())
        })
        .await;

        assert!(matches!(result, Err(PollError::Cancelled { attempts: 0 })));
    }

    #[tokio::test]
    async fn oversized_timeout_is_not_a_panic() {
        let config = PollConfig::default().with_timeout(Duration::from_secs(u64::MAX));

        let result = poll_until_success(&Context::new(), &config, || async {
            Ok::<_, String>(1)
        })
        .await;
        assert_eq!(result.unwrap(), 1);

        let ctx = Context::new().with_timeout(Duration::from_millis(40));
        let config = PollConfig {
            timeout: Duration::from_secs(u64::MAX),
            ..fast_config(Duration::ZERO)
        };
        let result: Result<(), _> =
            poll_until_success(&ctx, &config, || async { Err::<(), _>("nope") }).await;
        assert!(result.is_err());
    }

    #[test]
    fn default_config_is_bounded() {
        let config = PollConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_interval, Duration::from_secs(16));
    }
}
