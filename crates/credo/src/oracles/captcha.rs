// CAPTCHA oracle — server-to-server token verification.
//
// The oracle is only constructed when a secret is configured; without one,
// verification is bypassed entirely. Verification errors (network, non-2xx)
// count as failed verification, not as an outage.

use async_trait::async_trait;
use serde::Deserialize;

use credo_core::logger::AuthLogger;

#[async_trait]
pub trait CaptchaOracle: Send + Sync + std::fmt::Debug {
    async fn verify(&self, token: &str) -> bool;
}

/// Response shape shared by reCAPTCHA/hCaptcha-style verify endpoints.
#[derive(Debug, Deserialize)]
struct VerifyApiResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Live oracle for Google reCAPTCHA.
#[derive(Debug)]
pub struct RecaptchaOracle {
    client: reqwest::Client,
    secret: String,
    logger: AuthLogger,
}

impl RecaptchaOracle {
    pub fn new(secret: impl Into<String>, logger: AuthLogger) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret: secret.into(),
            logger,
        }
    }
}

#[async_trait]
impl CaptchaOracle for RecaptchaOracle {
    async fn verify(&self, token: &str) -> bool {
        let params = [("secret", self.secret.as_str()), ("response", token)];
        let response = match self.client.post(VERIFY_URL).form(&params).send().await {
            Ok(r) => r,
            Err(e) => {
                self.logger.error(&format!("captcha verification failed: {e}"));
                return false;
            }
        };

        match response.json::<VerifyApiResponse>().await {
            Ok(body) => {
                if !body.success && !body.error_codes.is_empty() {
                    self.logger
                        .warn(&format!("captcha rejected: {:?}", body.error_codes));
                }
                body.success
            }
            Err(e) => {
                self.logger.error(&format!("captcha response parse failed: {e}"));
                false
            }
        }
    }
}

/// Fixed-answer oracle for tests.
#[derive(Debug)]
pub struct StaticCaptchaOracle(pub bool);

#[async_trait]
impl CaptchaOracle for StaticCaptchaOracle {
    async fn verify(&self, _token: &str) -> bool {
        self.0
    }
}
