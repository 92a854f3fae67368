use crate::error::FetchError;
use crate::registry::{ProviderId, SourceRegistry};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;

// Type alias for the rate limiter to simplify signatures
type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Per-provider request quotas built from the registry's rate limits
///
/// Checks never wait: an exhausted quota means "skip this provider now".
pub struct ProviderRateLimiter {
    limiters: HashMap<ProviderId, DirectRateLimiter>,
}

impl ProviderRateLimiter {
    /// A rate limit of 0 leaves the provider unthrottled
    pub fn from_registry(registry: &SourceRegistry) -> Self {
        let mut limiters = HashMap::new();
        for descriptor in registry.providers() {
            let Some(per_second) = NonZeroU32::new(descriptor.rate_limit) else {
                continue;
            };
            limiters.insert(
                descriptor.id,
                RateLimiter::direct(Quota::per_second(per_second)),
            );
        }
        Self { limiters }
    }

    pub fn check(&self, provider: ProviderId) -> Result<(), FetchError> {
        match self.limiters.get(&provider) {
            Some(limiter) => limiter
                .check()
                .map_err(|_| FetchError::RateLimited { provider }),
            None => Ok(()),
        }
    }
}
