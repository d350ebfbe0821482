//! Fire-and-forget execution of mutations that must not hold up the response.
//!
//! Each scheduled operation runs on its own tokio task, detached from the
//! request that scheduled it. Dropping the request future does not cancel
//! it. Outcomes are only logged: there is no retry and nothing survives a
//! restart. The executor counts in-flight tasks so shutdown can wait for
//! them to drain.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::store::StoreError;

/// Spawns detached mutation tasks and tracks how many are still running.
#[derive(Clone, Default)]
pub struct DeferredExecutor {
    inner: Arc<ExecutorInner>,
}

#[derive(Default)]
struct ExecutorInner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count even if the task panics.
struct InFlightGuard(Arc<ExecutorInner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` in the background and return immediately.
    ///
    /// `label` and `subject` only appear in logs.
    pub fn schedule<F>(&self, label: &'static str, subject: String, operation: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(&self.inner));

        info!(operation = label, subject = %subject, "deferred_task_scheduled");

        tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();

            match operation.await {
                Ok(()) => {
                    info!(
                        operation = label,
                        subject = %subject,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "deferred_task_completed"
                    );
                }
                Err(e) => {
                    error!(
                        operation = label,
                        subject = %subject,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "deferred_task_failed"
                    );
                }
            }
        });
    }

    /// Number of scheduled operations that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no operations are running, or `timeout` elapses.
    ///
    /// Returns `true` when everything drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let idle = self.inner.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                idle.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => true,
            Err(_) => {
                warn!(in_flight = self.in_flight(), "deferred_drain_timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_schedule_returns_before_operation_runs() {
        let executor = DeferredExecutor::new();
        let gate = Arc::new(Notify::new());
        let done = Arc::new(AtomicBool::new(false));

        let (g, d) = (Arc::clone(&gate), Arc::clone(&done));
        executor.schedule("test", "subject".to_string(), async move {
            g.notified().await;
            d.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(executor.in_flight(), 1);
        assert!(!done.load(Ordering::SeqCst));

        gate.notify_one();
        assert!(executor.drain(Duration::from_secs(1)).await);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let executor = DeferredExecutor::new();
        executor.schedule("test", "subject".to_string(), async {
            Err(StoreError::Rejected("duplicate".to_string()))
        });

        assert!(executor.drain(Duration::from_secs(1)).await);
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_still_releases_slot() {
        let executor = DeferredExecutor::new();
        executor.schedule("test", "subject".to_string(), async {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        assert!(executor.drain(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let executor = DeferredExecutor::new();
        executor.schedule(
            "test",
            "subject".to_string(),
            std::future::pending::<Result<(), StoreError>>(),
        );

        assert!(!executor.drain(Duration::from_millis(20)).await);
        assert_eq!(executor.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_drain_when_idle() {
        assert!(DeferredExecutor::new().drain(Duration::from_millis(1)).await);
    }
}
