// Breached-password oracle over the HIBP Pwned Passwords range API.
//
// k-anonymity: only the first 5 hex chars of the SHA-1 hash leave the
// process. The API requirement is SHA-1, not SHA-256. Callers fail open on
// `OracleError`; an outage must not block registration.

use async_trait::async_trait;
use sha1::Digest;

/// Oracle outage. The caller decides what "open" means; for breach
/// screening it means "treat as not breached".
#[derive(Debug, Clone, thiserror::Error)]
#[error("oracle unavailable: {0}")]
pub struct OracleError(pub String);

#[async_trait]
pub trait BreachOracle: Send + Sync + std::fmt::Debug {
    /// Whether the password appears in a known breach corpus.
    async fn is_breached(&self, password: &str) -> Result<bool, OracleError>;
}

/// Live oracle backed by api.pwnedpasswords.com.
#[derive(Debug)]
pub struct HibpBreachOracle {
    client: reqwest::Client,
    /// Breach count at which a password is rejected.
    min_breaches: u32,
}

impl HibpBreachOracle {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            min_breaches: 1,
        }
    }

    pub fn with_min_breaches(mut self, min_breaches: u32) -> Self {
        self.min_breaches = min_breaches;
        self
    }

    /// Number of times the password appears in the breach corpus.
    pub async fn breach_count(&self, password: &str) -> Result<u32, OracleError> {
        let hash = sha1::Sha1::digest(password.as_bytes());
        let sha_hash = hex::encode(hash).to_uppercase();
        let prefix = &sha_hash[..5];
        let suffix = &sha_hash[5..];

        let url = format!("https://api.pwnedpasswords.com/range/{prefix}");
        let response = self
            .client
            .get(&url)
            .header("Add-Padding", "true")
            .header("User-Agent", "credo password checker")
            .send()
            .await
            .map_err(|e| OracleError(format!("range request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OracleError(format!("range request returned {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OracleError(format!("range response read failed: {e}")))?;

        // Each line is "SUFFIX:COUNT"
        let count = body
            .lines()
            .find_map(|line| {
                let mut parts = line.splitn(2, ':');
                let hash_suffix = parts.next()?.trim();
                let count_str = parts.next()?.trim();
                if hash_suffix.eq_ignore_ascii_case(suffix) {
                    count_str.parse::<u32>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);

        Ok(count)
    }
}

impl Default for HibpBreachOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BreachOracle for HibpBreachOracle {
    async fn is_breached(&self, password: &str) -> Result<bool, OracleError> {
        Ok(self.breach_count(password).await? >= self.min_breaches)
    }
}

/// Fixed-answer oracle for tests.
#[derive(Debug)]
pub enum StaticBreachOracle {
    Clean,
    Breached,
    Down,
}

#[async_trait]
impl BreachOracle for StaticBreachOracle {
    async fn is_breached(&self, _password: &str) -> Result<bool, OracleError> {
        match self {
            Self::Clean => Ok(false),
            Self::Breached => Ok(true),
            Self::Down => Err(OracleError("scripted outage".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_oracle_answers() {
        assert!(!StaticBreachOracle::Clean.is_breached("p").await.unwrap());
        assert!(StaticBreachOracle::Breached.is_breached("p").await.unwrap());
        assert!(StaticBreachOracle::Down.is_breached("p").await.is_err());
    }

    #[test]
    fn test_min_breaches_builder() {
        let oracle = HibpBreachOracle::new().with_min_breaches(5);
        assert_eq!(oracle.min_breaches, 5);
    }
}
