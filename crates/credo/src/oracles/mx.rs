// MX oracle — does the email domain publish MX records?

use async_trait::async_trait;

use credo_core::logger::AuthLogger;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

/// Boolean oracle over a domain's MX records.
#[async_trait]
pub trait MxOracle: Send + Sync + std::fmt::Debug {
    async fn has_mx(&self, domain: &str) -> bool;
}

/// Live DNS-backed oracle.
///
/// An authoritative "no records" answer is a `false`; resolver outages fail
/// open so DNS being down does not block registration.
pub struct DnsMxOracle {
    resolver: TokioAsyncResolver,
    logger: AuthLogger,
}

impl std::fmt::Debug for DnsMxOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsMxOracle").finish_non_exhaustive()
    }
}

impl DnsMxOracle {
    pub fn new(logger: AuthLogger) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            logger,
        }
    }
}

#[async_trait]
impl MxOracle for DnsMxOracle {
    async fn has_mx(&self, domain: &str) -> bool {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    self.logger.warn(&format!("no MX records found for domain {domain}"));
                    false
                }
                _ => {
                    // Fail open: DNS being unreachable is not the caller's fault.
                    self.logger
                        .warn(&format!("MX lookup failed for {domain}, allowing: {e}"));
                    true
                }
            },
        }
    }
}

/// Fixed-answer oracle for tests and for deployments without the check.
#[derive(Debug)]
pub struct StaticMxOracle(pub bool);

#[async_trait]
impl MxOracle for StaticMxOracle {
    async fn has_mx(&self, _domain: &str) -> bool {
        self.0
    }
}
