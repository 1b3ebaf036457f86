// Audit trail. Writes are fire-and-forget: a failed append is logged and
// swallowed, never surfaced to the request that produced it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use credo_core::logger::AuthLogger;
use credo_core::models::AuditRecord;
use credo_core::store::AuditStore;

use crate::context::RequestContext;

/// Audit action names.
pub mod actions {
    pub const USER_REGISTER: &str = "USER_REGISTER";
    pub const USER_LOGIN: &str = "USER_LOGIN";
    pub const TOKEN_REFRESH: &str = "TOKEN_REFRESH";
    pub const EMAIL_VERIFY: &str = "EMAIL_VERIFY";
    pub const PROFILE_PROVISION: &str = "PROFILE_PROVISION";
}

/// Audit outcome names.
pub mod outcomes {
    pub const SUCCESS: &str = "SUCCESS";
    pub const FAILURE: &str = "FAILURE";
}

#[derive(Debug, Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
    logger: AuthLogger,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>, logger: AuthLogger) -> Self {
        Self { store, logger }
    }

    /// Append an audit record. Never fails the caller.
    pub async fn append(
        &self,
        account_id: Option<Uuid>,
        action: &str,
        outcome: &str,
        ctx: &RequestContext,
        metadata: serde_json::Value,
    ) {
        let record = AuditRecord {
            id: Uuid::new_v4(),
            account_id,
            action: action.to_string(),
            outcome: outcome.to_string(),
            ip: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            metadata,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.append(record).await {
            self.logger
                .error(&format!("failed to write audit log for {action}: {e}"));
        }
    }
}
