#![doc = include_str!("../README.md")]

pub mod error;
pub mod logger;
pub mod metrics;
pub mod models;
pub mod options;
pub mod store;

// Re-exports for convenience
pub use error::{AuthError, AuthResult, QueueError, StoreError, StoreResult};
pub use logger::{AuthLogger, LogHandler, LogLevel, LoggerConfig};
pub use metrics::{AuthMetrics, FacadeMetrics, NoopMetrics};
pub use models::{
    Account, AuditRecord, EmailVerificationToken, IdempotencyRecord, ProvisioningJob, TokenClaims,
    TokenPair,
};
pub use options::{CredoOptions, KeyMaterial};
pub use store::{AccountStore, AuditStore, IdempotencyStore, ProvisioningQueue, VerificationTokenStore};
