use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Caps how many browser processes run at the same time.
///
/// A permit is moved into the blocking job that owns the browser and is
/// released when that job ends, whether it returns or panics.
#[derive(Debug, Clone)]
pub struct ScrapeGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ScrapeGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        tracing::debug!("Scrape slot acquired ({} of {} free)", self.available(), self.limit);
        Ok(permit)
    }

    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }
}

impl Default for ScrapeGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_limits_permits() {
        let gate = ScrapeGate::new(2);
        let first = gate.acquire().await.unwrap();
        let _second = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert_eq!(gate.available(), 1);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_permit_released_when_job_panics() {
        let gate = ScrapeGate::new(1);
        let permit = gate.acquire().await.unwrap();

        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            panic!("browser crashed");
        });
        assert!(job.await.is_err());
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        assert_eq!(ScrapeGate::new(0).limit(), 1);
        assert_eq!(ScrapeGate::default().limit(), DEFAULT_MAX_CONCURRENT);
    }
}
