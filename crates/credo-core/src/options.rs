// Typed configuration for the credential service.
//
// Every knob has a production default; `CredoOptions::from_env` overlays
// environment variables on top of the defaults.

use std::time::Duration;

/// Signing material for one token class.
///
/// An RSA key pair is the intended configuration. The shared-secret
/// fallback exists for development; constructing a context with it logs
/// loudly — it is never a silent default.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// PEM-encoded RSA private + public key (RS256).
    RsaPem { private_key: String, public_key: String },
    /// HMAC shared secret (HS256). Insecure fallback.
    SharedSecret(String),
}

impl KeyMaterial {
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, Self::RsaPem { .. })
    }
}

/// Key material per token class. Access and refresh tokens are always
/// signed with distinct keys.
#[derive(Debug, Clone)]
pub struct KeyOptions {
    pub access: KeyMaterial,
    pub refresh: KeyMaterial,
}

#[derive(Debug, Clone)]
pub struct TokenOptions {
    /// Access token lifetime (default: 15 minutes).
    pub access_ttl: Duration,
    /// Refresh token lifetime (default: 7 days).
    pub refresh_ttl: Duration,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordOptions {
    /// Server-side pepper appended to the password before hashing.
    pub pepper: String,
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            pepper: String::new(),
            min_length: 8,
            max_length: 128,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitOptions {
    pub enabled: bool,
    /// Sliding window size (default: 60 s).
    pub window: Duration,
    /// Admissions per window per key (default: 5).
    pub max: usize,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(60),
            max: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdempotencyOptions {
    /// Replay window (default: 24 h).
    pub window: Duration,
}

impl Default for IdempotencyOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerOptions {
    /// Error ratio at which the circuit opens (default: 0.5).
    pub error_ratio: f64,
    /// Rolling sample capacity (default: 10 outcomes).
    pub sample_size: usize,
    /// Minimum outcomes before the ratio is meaningful (default: 4).
    pub min_samples: usize,
    /// Open-state cool-down before a half-open probe (default: 30 s).
    pub cooldown: Duration,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            error_ratio: 0.5,
            sample_size: 10,
            min_samples: 4,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvisioningOptions {
    /// gRPC endpoint of the downstream profile service, if configured.
    pub rpc_endpoint: Option<String>,
    /// HTTP base URL of the downstream profile service.
    pub http_endpoint: String,
    /// Per-call timeout (default: 1 s).
    pub call_timeout: Duration,
    /// Synchronous retries after the initial attempt (default: 3).
    pub retries: usize,
    /// First retry delay (default: 100 ms).
    pub retry_min_delay: Duration,
    /// Retry delay cap (default: 1 s).
    pub retry_max_delay: Duration,
    pub breaker: BreakerOptions,
    /// First compensation redelivery delay (default: 2 s).
    pub queue_base_delay: Duration,
    /// Compensation attempts before terminal failure (default: 10).
    pub max_job_attempts: u32,
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            rpc_endpoint: None,
            http_endpoint: "http://localhost:50051".to_string(),
            call_timeout: Duration::from_secs(1),
            retries: 3,
            retry_min_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(1),
            breaker: BreakerOptions::default(),
            queue_base_delay: Duration::from_secs(2),
            max_job_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OracleOptions {
    /// MX lookup on the email domain, off unless enabled.
    pub mx_check_enabled: bool,
    /// Breached-password screening, off unless enabled.
    pub breach_check_enabled: bool,
    /// CAPTCHA verification secret; verification is bypassed when absent.
    pub captcha_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerificationOptions {
    /// Email-verification token lifetime (default: 24 h).
    pub token_ttl: Duration,
    /// Base URL used to render the verification link.
    pub link_base_url: String,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(24 * 60 * 60),
            link_base_url: "http://localhost:3000/api/auth/verify-email".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct CredoOptions {
    pub app_name: String,
    pub keys: KeyOptions,
    pub token: TokenOptions,
    pub password: PasswordOptions,
    pub rate_limit: RateLimitOptions,
    pub idempotency: IdempotencyOptions,
    pub provisioning: ProvisioningOptions,
    pub oracles: OracleOptions,
    pub verification: VerificationOptions,
}

impl CredoOptions {
    /// Development defaults with shared-secret signing keys.
    pub fn with_secrets(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            app_name: "credo".to_string(),
            keys: KeyOptions {
                access: KeyMaterial::SharedSecret(access_secret.into()),
                refresh: KeyMaterial::SharedSecret(refresh_secret.into()),
            },
            token: TokenOptions::default(),
            password: PasswordOptions::default(),
            rate_limit: RateLimitOptions::default(),
            idempotency: IdempotencyOptions::default(),
            provisioning: ProvisioningOptions::default(),
            oracles: OracleOptions::default(),
            verification: VerificationOptions::default(),
        }
    }

    /// Load options from environment variables, falling back to defaults.
    ///
    /// Key material: `CREDO_ACCESS_PRIVATE_KEY`/`CREDO_ACCESS_PUBLIC_KEY`
    /// (and the `REFRESH` pair) select RS256; otherwise
    /// `CREDO_ACCESS_SECRET`/`CREDO_REFRESH_SECRET` select the HS256
    /// fallback.
    pub fn from_env() -> Self {
        let mut options = Self::with_secrets(
            env_or("CREDO_ACCESS_SECRET", "dev-access-secret-change-me"),
            env_or("CREDO_REFRESH_SECRET", "dev-refresh-secret-change-me"),
        );

        if let (Ok(private_key), Ok(public_key)) = (
            std::env::var("CREDO_ACCESS_PRIVATE_KEY"),
            std::env::var("CREDO_ACCESS_PUBLIC_KEY"),
        ) {
            options.keys.access = KeyMaterial::RsaPem { private_key, public_key };
        }
        if let (Ok(private_key), Ok(public_key)) = (
            std::env::var("CREDO_REFRESH_PRIVATE_KEY"),
            std::env::var("CREDO_REFRESH_PUBLIC_KEY"),
        ) {
            options.keys.refresh = KeyMaterial::RsaPem { private_key, public_key };
        }

        options.password.pepper = env_or("CREDO_PASSWORD_PEPPER", "");
        options.oracles.mx_check_enabled = env_flag("CREDO_MX_CHECK_ENABLED");
        options.oracles.breach_check_enabled = env_flag("CREDO_BREACH_CHECK_ENABLED");
        options.oracles.captcha_secret = std::env::var("CREDO_CAPTCHA_SECRET").ok();

        if let Ok(url) = std::env::var("CREDO_PROFILE_SERVICE_URL") {
            options.provisioning.http_endpoint = url;
        }
        options.provisioning.rpc_endpoint = std::env::var("CREDO_PROFILE_SERVICE_GRPC").ok();

        options
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}
