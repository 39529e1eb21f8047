//! Content indexers ("providers") that are searched for releases.

mod jackett;
mod newznab;
mod rate_limiter;
mod types;

pub use jackett::JackettProvider;
pub use newznab::NewznabProvider;
pub use rate_limiter::{RateLimiterPool, TokenBucket};
pub use types::*;

use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderKind};

/// Create the enabled providers, sharing one rate limiter pool.
pub fn build_providers(
    configs: &[ProviderConfig],
    max_results: usize,
) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
    let enabled: Vec<&ProviderConfig> = configs.iter().filter(|c| c.enabled).collect();
    let limiter = Arc::new(RateLimiterPool::new(
        enabled.iter().map(|c| (c.name.as_str(), c.rate_limit_rpm)),
    ));

    enabled
        .into_iter()
        .map(|config| -> Result<Arc<dyn Provider>, ProviderError> {
            Ok(match config.kind {
                ProviderKind::Jackett => Arc::new(JackettProvider::new(
                    config,
                    max_results,
                    Arc::clone(&limiter),
                )?),
                ProviderKind::Newznab => Arc::new(NewznabProvider::new(
                    config,
                    max_results,
                    Arc::clone(&limiter),
                )?),
            })
        })
        .collect()
}
