use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc};
use thiserror::Error;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Concurrency gate closed: {0}")]
    Closed(#[from] AcquireError),
}

/// Bounds in-flight probes per domain key and across the whole run.
///
/// Domain permit sets are created on first sighting of a domain and kept for
/// the lifetime of the gate.
pub struct DomainGate {
    domains: DashMap<String, Arc<Semaphore>>,
    limiters: DashMap<String, Arc<Limiter>>,
    global: Arc<Semaphore>,
    per_domain: usize,
    quota: Option<Quota>,
}

/// Held for the duration of one probe. Dropping it releases both permits.
#[derive(Debug)]
pub struct GatePermit {
    _domain: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl DomainGate {
    pub fn new(per_domain: u32, global: u32, rate_per_second: Option<u32>) -> Self {
        Self {
            domains: DashMap::new(),
            limiters: DashMap::new(),
            global: Arc::new(Semaphore::new(global.max(1) as usize)),
            per_domain: per_domain.max(1) as usize,
            quota: rate_per_second.and_then(NonZeroU32::new).map(Quota::per_second),
        }
    }

    pub async fn acquire(&self, domain: &str) -> Result<GatePermit, GateError> {
        let domain_permit = self.semaphore_for(domain).acquire_owned().await?;
        let global_permit = Arc::clone(&self.global).acquire_owned().await?;

        if let Some(limiter) = self.limiter_for(domain) {
            limiter.until_ready().await;
        }

        Ok(GatePermit {
            _domain: domain_permit,
            _global: global_permit,
        })
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Free permits for `domain`, or `None` if the domain was never seen.
    pub fn available(&self, domain: &str) -> Option<usize> {
        self.domains.get(domain).map(|s| s.available_permits())
    }

    pub fn global_available(&self) -> usize {
        self.global.available_permits()
    }

    fn semaphore_for(&self, domain: &str) -> Arc<Semaphore> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_domain)))
            .clone()
    }

    fn limiter_for(&self, domain: &str) -> Option<Arc<Limiter>> {
        let quota = self.quota?;
        Some(
            self.limiters
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(RateLimiter::direct(quota)))
                .clone(),
        )
    }
}
