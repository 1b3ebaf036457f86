// Random token generation.

use rand::RngCore;

/// Generate a hex-encoded random token from `bytes` random bytes.
///
/// Email verification tokens use 32 bytes (64 hex chars).
pub fn generate_hex_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_length() {
        assert_eq!(generate_hex_token(0).len(), 0);
        assert_eq!(generate_hex_token(16).len(), 32);
        assert_eq!(generate_hex_token(32).len(), 64);
    }

    #[test]
    fn test_hex_characters_only() {
        let token = generate_hex_token(64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_uniqueness() {
        assert_ne!(generate_hex_token(32), generate_hex_token(32));
    }
}
