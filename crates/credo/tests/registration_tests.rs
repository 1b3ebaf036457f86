// End-to-end registration pipeline tests against the in-memory backend
// with scripted downstream transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use credo::context::{AuthContext, AuthContextBuilder, RequestContext};
use credo::oracles::{StaticBreachOracle, StaticCaptchaOracle, StaticMxOracle};
use credo::provisioning::{ProfileTransport, ProvisionOutcome, TransportError};
use credo::register::{handle_register, RegistrationRequest};
use credo_core::error::AuthError;
use credo_core::metrics::AuthMetrics;
use credo_core::options::CredoOptions;
use credo_memory::{MemoryQueue, MemoryStore};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Conflict,
    Fail,
    Hang,
}

#[derive(Debug)]
struct FakeTransport {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileTransport for FakeTransport {
    async fn create_profile(
        &self,
        _account_id: Uuid,
        _username: &str,
        _request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(ProvisionOutcome::Created),
            Behavior::Conflict => Ok(ProvisionOutcome::AlreadyExists),
            Behavior::Fail => Err(TransportError::Unavailable("scripted failure".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProvisionOutcome::Created)
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecordingMetrics {
    attempts: Mutex<Vec<(String, String)>>,
}

impl AuthMetrics for RecordingMetrics {
    fn record_attempt(&self, operation: &str, outcome: &str) {
        self.attempts
            .lock()
            .unwrap()
            .push((operation.to_string(), outcome.to_string()));
    }
}

fn fast_options() -> CredoOptions {
    let mut options = CredoOptions::with_secrets("test-access-secret", "test-refresh-secret");
    options.provisioning.call_timeout = Duration::from_millis(20);
    options.provisioning.retry_min_delay = Duration::from_millis(1);
    options.provisioning.retry_max_delay = Duration::from_millis(4);
    options
}

struct Harness {
    ctx: Arc<AuthContext>,
    store: MemoryStore,
    queue: MemoryQueue,
}

fn harness_with(
    options: CredoOptions,
    transport: Arc<dyn ProfileTransport>,
    customize: impl FnOnce(AuthContextBuilder) -> AuthContextBuilder,
) -> Harness {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();

    let builder = AuthContext::builder(options)
        .account_store(Arc::new(store.clone()))
        .idempotency_store(Arc::new(store.clone()))
        .verification_token_store(Arc::new(store.clone()))
        .audit_store(Arc::new(store.clone()))
        .provisioning_queue(Arc::new(queue.clone()))
        .http_transport(transport)
        .mx_oracle(Arc::new(StaticMxOracle(true)))
        .breach_oracle(Arc::new(StaticBreachOracle::Clean))
        .logger(credo_core::logger::AuthLogger::disabled());

    let ctx = customize(builder).build().unwrap();
    Harness { ctx, store, queue }
}

fn harness(transport: Arc<dyn ProfileTransport>) -> Harness {
    harness_with(fast_options(), transport, |b| b)
}

fn request(email: &str, username: &str, key: Option<&str>) -> RegistrationRequest {
    RegistrationRequest {
        email: email.to_string(),
        password: "Str0ngP@ssw0rd!".to_string(),
        username: username.to_string(),
        first_name: "A".to_string(),
        last_name: "L".to_string(),
        idempotency_key: key.map(|k| k.to_string()),
    }
}

fn rctx() -> RequestContext {
    RequestContext::new().with_ip("1.2.3.4").with_user_agent("tests")
}

#[tokio::test]
async fn registration_succeeds_and_provisions() {
    let transport = FakeTransport::new(Behavior::Succeed);
    let h = harness(transport.clone());

    let response = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();

    assert!(!response.access_token.is_empty());
    assert_eq!(response.expires_in, 900);
    assert_eq!(response.account.email, "a@x.com");
    assert!(!response.replayed);
    assert_eq!(h.store.account_count().await, 1);
    assert_eq!(transport.calls(), 1);
    assert!(h.queue.is_empty());
    // A verification token was issued alongside the account.
    assert_eq!(h.store.verification_token_count().await, 1);
}

#[tokio::test]
async fn duplicate_email_conflicts_on_email_field() {
    let h = harness(FakeTransport::new(Behavior::Succeed));

    handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();
    let err = handle_register(&h.ctx, request("A@X.com", "bob", None), &rctx())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Conflict { ref field } if field == "email"));
    assert_eq!(h.store.account_count().await, 1);
}

#[tokio::test]
async fn duplicate_username_conflicts_on_username_field() {
    let h = harness(FakeTransport::new(Behavior::Succeed));

    handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();
    let err = handle_register(&h.ctx, request("b@x.com", "alice", None), &rctx())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Conflict { ref field } if field == "username"));
}

#[tokio::test]
async fn reserved_username_conflicts() {
    let h = harness(FakeTransport::new(Behavior::Succeed));

    let err = handle_register(&h.ctx, request("a@x.com", "admin", None), &rctx())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Conflict { ref field } if field == "username"));
    assert_eq!(h.store.account_count().await, 0);
}

#[tokio::test]
async fn idempotent_replay_returns_original_result() {
    let h = harness(FakeTransport::new(Behavior::Succeed));

    let first = handle_register(&h.ctx, request("a@x.com", "alice", Some("k1")), &rctx())
        .await
        .unwrap();
    let replay = handle_register(&h.ctx, request("a@x.com", "alice2", Some("k1")), &rctx())
        .await
        .unwrap();

    // Same account id, same token, no second row.
    assert_eq!(replay.account.id, first.account.id);
    assert_eq!(replay.access_token, first.access_token);
    assert!(replay.replayed);
    assert_eq!(h.store.account_count().await, 1);

    // Same email under a different key is a fresh attempt — and conflicts.
    let err = handle_register(&h.ctx, request("a@x.com", "alice3", Some("k2")), &rctx())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict { ref field } if field == "email"));
}

#[tokio::test]
async fn expired_idempotency_window_means_fresh_attempt() {
    let mut options = fast_options();
    options.idempotency.window = Duration::ZERO;
    let h = harness_with(options, FakeTransport::new(Behavior::Succeed), |b| b);

    handle_register(&h.ctx, request("a@x.com", "alice", Some("k1")), &rctx())
        .await
        .unwrap();
    // The record exists but is already expired, so the replay is treated
    // as a fresh attempt and hits the uniqueness check.
    let err = handle_register(&h.ctx, request("a@x.com", "alice", Some("k1")), &rctx())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict { .. }));
}

#[tokio::test]
async fn downstream_conflict_is_success_and_enqueues_nothing() {
    let transport = FakeTransport::new(Behavior::Conflict);
    let h = harness(transport.clone());

    let response = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();

    assert!(!response.access_token.is_empty());
    assert_eq!(transport.calls(), 1);
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn downstream_timeouts_still_register_and_enqueue_one_job() {
    let transport = FakeTransport::new(Behavior::Hang);
    let h = harness(transport.clone());

    let response = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();

    // Initial attempt + 3 retries, each abandoned at the deadline.
    assert!(!response.access_token.is_empty());
    assert_eq!(transport.calls(), 4);

    let jobs = h.queue.snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].attempt_number, 0);
    assert_eq!(jobs[0].account_id, response.account.id);
    assert_eq!(jobs[0].username, "alice");
}

#[tokio::test]
async fn queue_outage_never_fails_the_registration() {
    let h = harness(FakeTransport::new(Behavior::Fail));
    h.queue.set_unavailable(true);

    let response = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx()).await;

    assert!(response.is_ok());
    assert_eq!(h.store.account_count().await, 1);
}

#[tokio::test]
async fn rate_limit_admits_five_then_rejects() {
    let h = harness(FakeTransport::new(Behavior::Succeed));
    let ctx = rctx();

    // Five admissions for the same (ip, route, email) key. The attempts
    // all fail later in the pipeline (conflicts), which does not matter:
    // admission counts attempts, not outcomes.
    for i in 0..5 {
        let _ = handle_register(&h.ctx, request("a@x.com", &format!("user{i}"), None), &ctx).await;
    }

    let err = handle_register(&h.ctx, request("a@x.com", "user6", None), &ctx)
        .await
        .unwrap_err();
    match err {
        AuthError::RateLimited { retry_after } => assert!(retry_after <= 60),
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // A different email from the same IP has its own quota.
    assert!(
        handle_register(&h.ctx, request("b@x.com", "bob", None), &ctx)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn mx_check_rejects_domains_without_records() {
    let mut options = fast_options();
    options.oracles.mx_check_enabled = true;
    let h = harness_with(options, FakeTransport::new(Behavior::Succeed), |b| {
        b.mx_oracle(Arc::new(StaticMxOracle(false)))
    });

    let err = handle_register(&h.ctx, request("a@nomx.example", "alice", None), &rctx())
        .await
        .unwrap_err();

    match err {
        AuthError::Validation { fields } => assert!(fields.contains_key("email")),
        other => panic!("expected Validation, got {other:?}"),
    }
    assert_eq!(h.store.account_count().await, 0);
}

#[tokio::test]
async fn breached_password_rejected_but_outage_fails_open() {
    let mut options = fast_options();
    options.oracles.breach_check_enabled = true;

    let breached = harness_with(
        options.clone(),
        FakeTransport::new(Behavior::Succeed),
        |b| b.breach_oracle(Arc::new(StaticBreachOracle::Breached)),
    );
    let err = handle_register(&breached.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap_err();
    match err {
        AuthError::Validation { fields } => assert!(fields.contains_key("password")),
        other => panic!("expected Validation, got {other:?}"),
    }

    // Oracle down: registration proceeds.
    let down = harness_with(options, FakeTransport::new(Behavior::Succeed), |b| {
        b.breach_oracle(Arc::new(StaticBreachOracle::Down))
    });
    assert!(
        handle_register(&down.ctx, request("a@x.com", "alice", None), &rctx())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn captcha_required_when_configured() {
    let h = harness_with(fast_options(), FakeTransport::new(Behavior::Succeed), |b| {
        b.captcha_oracle(Arc::new(StaticCaptchaOracle(true)))
    });

    // No token supplied.
    let err = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));

    // Token supplied and verified.
    let with_token = rctx().with_captcha_token("captcha-token");
    assert!(
        handle_register(&h.ctx, request("a@x.com", "alice", None), &with_token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn captcha_rejection_is_a_validation_error() {
    let h = harness_with(fast_options(), FakeTransport::new(Behavior::Succeed), |b| {
        b.captcha_oracle(Arc::new(StaticCaptchaOracle(false)))
    });

    let err = handle_register(
        &h.ctx,
        request("a@x.com", "alice", None),
        &rctx().with_captcha_token("bad-token"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));
}

#[tokio::test]
async fn store_outage_surfaces_as_dependency_unavailable() {
    let h = harness(FakeTransport::new(Behavior::Succeed));
    h.store.set_unavailable(true);

    let err = handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DependencyUnavailable(_)));
}

#[tokio::test]
async fn terminal_outcomes_reach_audit_and_metrics() {
    let metrics = Arc::new(RecordingMetrics::default());
    let metrics_for_builder = metrics.clone();
    let h = harness_with(fast_options(), FakeTransport::new(Behavior::Succeed), |b| {
        b.metrics(metrics_for_builder)
    });

    handle_register(&h.ctx, request("a@x.com", "alice", None), &rctx())
        .await
        .unwrap();
    let _ = handle_register(&h.ctx, request("a@x.com", "bob", None), &rctx()).await;

    let attempts = metrics.attempts.lock().unwrap().clone();
    assert_eq!(attempts[0], ("register".to_string(), "success".to_string()));
    assert_eq!(attempts[1], ("register".to_string(), "CONFLICT".to_string()));

    let audit = h.store.audit_records().await;
    let register_outcomes: Vec<_> = audit
        .iter()
        .filter(|r| r.action == "USER_REGISTER")
        .map(|r| r.outcome.as_str())
        .collect();
    assert_eq!(register_outcomes, vec!["SUCCESS", "FAILURE"]);
}
