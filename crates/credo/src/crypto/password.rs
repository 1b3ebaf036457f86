// Password hashing with scrypt (N=16384, r=16, p=1, dkLen=64), random
// 16-byte salt, and a server-side pepper appended before derivation.
// Output format: "hex(salt):hex(key)".
//
// The cost factor lands around 100 ms per derivation, which is also why the
// same helper digests refresh tokens: a leaked digest cannot be reversed
// into a usable token.

use rand::RngCore;
use scrypt::{scrypt, Params};
use subtle::ConstantTimeEq;

use credo_core::error::{AuthError, AuthResult};

/// Hash a password (or any secret) with a fresh random salt.
pub fn hash_password(password: &str, pepper: &str) -> AuthResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt_hex = hex::encode(salt_bytes);

    let key = derive_key(password, pepper, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Verify a secret against a hash produced by [`hash_password`].
pub fn verify_password(hash: &str, password: &str, pepper: &str) -> AuthResult<bool> {
    let (salt, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| AuthError::internal("invalid password hash format"))?;

    let expected_key = hex::decode(key_hex)
        .map_err(|e| AuthError::internal(format!("invalid hex in password hash: {e}")))?;

    let derived_key = derive_key(password, pepper, salt)?;

    Ok(derived_key.ct_eq(&expected_key).into())
}

/// Derive a 64-byte key using scrypt over password+pepper.
fn derive_key(password: &str, pepper: &str, salt: &str) -> AuthResult<Vec<u8>> {
    // N=16384 → log2(N)=14, r=16, p=1, dkLen=64
    let params = Params::new(14, 16, 1, 64)
        .map_err(|e| AuthError::internal(format!("invalid scrypt params: {e}")))?;

    let peppered = format!("{password}{pepper}");

    let mut output = vec![0u8; 64];
    scrypt(peppered.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| AuthError::internal(format!("scrypt failed: {e}")))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "my-secret-password";
        let hash = hash_password(password, "").unwrap();

        // Hash format: salt:key — 16-byte salt, 64-byte key, hex-encoded
        let parts: Vec<&str> = hash.split(':').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 32);
        assert_eq!(parts[1].len(), 128);

        assert!(verify_password(&hash, password, "").unwrap());
        assert!(!verify_password(&hash, "wrong-password", "").unwrap());
    }

    #[test]
    fn test_pepper_changes_the_digest() {
        let hash = hash_password("password", "pepper-a").unwrap();
        assert!(verify_password(&hash, "password", "pepper-a").unwrap());
        // The right password with the wrong pepper does not verify.
        assert!(!verify_password(&hash, "password", "pepper-b").unwrap());
        assert!(!verify_password(&hash, "password", "").unwrap());
    }

    #[test]
    fn test_different_hashes_per_call() {
        let hash1 = hash_password("same-password", "").unwrap();
        let hash2 = hash_password("same-password", "").unwrap();
        // Different salts → different hashes, both verify
        assert_ne!(hash1, hash2);
        assert!(verify_password(&hash1, "same-password", "").unwrap());
        assert!(verify_password(&hash2, "same-password", "").unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("no-colon-here", "password", "").is_err());
    }
}
