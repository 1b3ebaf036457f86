// JWT sign/verify using the `jsonwebtoken` crate.
//
// RS256 when an RSA key pair is configured; HS256 shared-secret fallback
// otherwise. Verification collapses every failure mode (bad signature,
// expiry, malformed token) into `AuthError::InvalidToken`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use credo_core::error::{AuthError, AuthResult};
use credo_core::logger::AuthLogger;
use credo_core::options::KeyMaterial;

/// Resolved signing key for one token class.
pub struct SigningKey {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl SigningKey {
    /// Resolve key material into usable keys.
    ///
    /// A shared secret is accepted but logged loudly; it must never end up
    /// in production unnoticed.
    pub fn from_material(
        material: &KeyMaterial,
        class_name: &str,
        logger: &AuthLogger,
    ) -> AuthResult<Self> {
        match material {
            KeyMaterial::RsaPem { private_key, public_key } => Ok(Self {
                algorithm: Algorithm::RS256,
                encoding: EncodingKey::from_rsa_pem(private_key.as_bytes())
                    .map_err(|e| AuthError::internal(format!("invalid {class_name} private key: {e}")))?,
                decoding: DecodingKey::from_rsa_pem(public_key.as_bytes())
                    .map_err(|e| AuthError::internal(format!("invalid {class_name} public key: {e}")))?,
            }),
            KeyMaterial::SharedSecret(secret) => {
                logger.warn(&format!(
                    "signing {class_name} tokens with a shared secret (HS256); \
                     configure an RSA key pair before deploying to production"
                ));
                Ok(Self {
                    algorithm: Algorithm::HS256,
                    encoding: EncodingKey::from_secret(secret.as_bytes()),
                    decoding: DecodingKey::from_secret(secret.as_bytes()),
                })
            }
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Internal claims wrapper adding `iat`/`exp` around the payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    payload: serde_json::Value,
    iat: i64,
    exp: i64,
}

/// Sign a payload. `expires_in_secs` may be negative (tests issue
/// already-expired tokens that way).
pub fn sign<T: Serialize>(payload: &T, key: &SigningKey, expires_in_secs: i64) -> AuthResult<String> {
    let now = chrono::Utc::now().timestamp();

    let claims = Claims {
        payload: serde_json::to_value(payload)
            .map_err(|e| AuthError::internal(format!("failed to serialize JWT payload: {e}")))?,
        iat: now,
        exp: now + expires_in_secs,
    };

    let header = Header::new(key.algorithm);
    jsonwebtoken::encode(&header, &claims, &key.encoding)
        .map_err(|e| AuthError::internal(format!("JWT signing failed: {e}")))
}

/// Verify and decode a token.
///
/// The caller cannot distinguish "expired" from "forged"; both are
/// `InvalidToken`.
pub fn verify<T: DeserializeOwned>(token: &str, key: &SigningKey) -> AuthResult<T> {
    let mut validation = Validation::new(key.algorithm);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.required_spec_claims.clear();

    let token_data = jsonwebtoken::decode::<Claims>(token, &key.decoding, &validation)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_value(token_data.claims.payload).map_err(|_| AuthError::InvalidToken)
}
