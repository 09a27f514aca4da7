//! Concurrency gate bounding simultaneous external executions
//!
//! A fixed-capacity counting permit pool protects disk I/O and CPU from
//! unbounded concurrent transcoder processes. The permit counter is the only
//! synchronized state shared between requests.

use crate::config::AdmissionPolicy;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Capacity-bounded admission for pipeline executions
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    policy: AdmissionPolicy,
}

/// An admission slot held for the duration of one pipeline execution
///
/// Released exactly once, when dropped — the same scoped-release discipline
/// as workspace cleanup, so every pipeline exit path gives the slot back.
#[derive(Debug)]
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `capacity` concurrent executions
    pub fn new(capacity: usize, policy: AdmissionPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            policy,
        }
    }

    /// Acquire an admission slot
    ///
    /// With [`AdmissionPolicy::FailFast`] a saturated gate rejects
    /// immediately; with [`AdmissionPolicy::Wait`] the caller blocks up to
    /// the admission timeout first. Either way a saturated gate produces
    /// [`Error::Overloaded`].
    pub async fn acquire(&self) -> Result<Permit> {
        let permit = match self.policy {
            AdmissionPolicy::FailFast => self
                .semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| Error::Overloaded)?,
            AdmissionPolicy::Wait(wait_ms) => {
                let wait = Duration::from_millis(wait_ms);
                tokio::time::timeout(wait, self.semaphore.clone().acquire_owned())
                    .await
                    .map_err(|_| Error::Overloaded)?
                    .map_err(|_| Error::Overloaded)?
            }
        };

        Ok(Permit { _inner: permit })
    }

    /// Number of slots currently available
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_fast_rejects_beyond_capacity() {
        let gate = ConcurrencyGate::new(2, AdmissionPolicy::FailFast);

        let first = gate.acquire().await.unwrap();
        let _second = gate.acquire().await.unwrap();

        assert!(matches!(gate.acquire().await, Err(Error::Overloaded)));

        // Releasing a permit frees a slot again.
        drop(first);
        assert!(gate.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_permit_released_exactly_once_on_drop() {
        let gate = ConcurrencyGate::new(1, AdmissionPolicy::FailFast);
        assert_eq!(gate.available(), 1);

        let permit = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);

        drop(permit);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_wait_policy_times_out_when_saturated() {
        let gate = ConcurrencyGate::new(1, AdmissionPolicy::Wait(50));
        let _held = gate.acquire().await.unwrap();

        let started = std::time::Instant::now();
        let result = gate.acquire().await;

        assert!(matches!(result, Err(Error::Overloaded)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_policy_admits_when_slot_frees_up() {
        let gate = ConcurrencyGate::new(1, AdmissionPolicy::Wait(1_000));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }
}
