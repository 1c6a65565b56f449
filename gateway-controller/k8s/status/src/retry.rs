//! Optimistic-concurrency retry for status writes.

use std::{future::Future, time::Duration};

/// Attempt budget for conflicting writes, after which the conflict surfaces
/// to the caller so the runtime requeues with backoff.
const RETRY_STEPS: u32 = 5;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

pub fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 409)
}

/// Runs `f` until it succeeds, fails with a non-conflict error, or exhausts
/// the retry budget. Each retry re-runs the whole closure, which is expected
/// to GET a fresh copy, mutate, and PUT.
pub async fn on_conflict<T, F, Fut>(mut f: F) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 0;

    loop {
        match f().await {
            Err(error) if is_conflict(&error) && attempt + 1 < RETRY_STEPS => {
                attempt += 1;
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    fn conflict() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        })
    }

    fn server_error() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        })
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = on_conflict(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_conflict_exhausts_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = on_conflict(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            }
        })
        .await;
        assert!(is_conflict(&result.unwrap_err()));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_STEPS);
    }

    #[tokio::test]
    async fn non_conflict_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = on_conflict(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            }
        })
        .await;
        assert!(!is_conflict(&result.unwrap_err()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
