use std::future::Future;

use tracing::{error, info};

use crate::config::RetryPolicy;
use crate::error::{DbError, Store};

/// Calls `connect` until it succeeds or `policy.attempts` is used up,
/// sleeping `policy.delay` between attempts.
pub async fn connect_with_retry<T, E, F, Fut>(
    store: Store,
    policy: &RetryPolicy,
    mut connect: F,
) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error = String::new();
    for attempt in 1..=policy.attempts {
        match connect().await {
            Ok(conn) => {
                info!(%store, attempt, "connected");
                return Ok(conn);
            }
            Err(e) => {
                error!(%store, attempt, error = %e, "could not connect");
                last_error = e.to_string();
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    error!(%store, attempts = policy.attempts, "giving up on connection");
    Err(DbError::ConnectExhausted {
        store,
        attempts: policy.attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 20,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbError> = connect_with_retry(Store::Sql, &fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("connection refused") }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 20);
        match result {
            Err(DbError::ConnectExhausted {
                store,
                attempts,
                last_error,
            }) => {
                assert_eq!(store, Store::Sql);
                assert_eq!(attempts, 20);
                assert_eq!(last_error, "connection refused");
            }
            other => panic!("expected ConnectExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let conn = connect_with_retry(Store::Graph, &fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("not ready")
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(conn, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_waits_between_attempts_only() {
        let policy = RetryPolicy {
            attempts: 20,
            delay: Duration::from_secs(5),
        };
        let started = tokio::time::Instant::now();
        let result: Result<(), DbError> =
            connect_with_retry(Store::Graph, &policy, || async { Err::<(), _>("down") }).await;

        assert!(result.is_err());
        assert_eq!(started.elapsed(), Duration::from_secs(5 * 19));
    }
}
