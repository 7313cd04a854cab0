// api-server/src/utils/token.rs
use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;
use sha2::{Sha256, Digest};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a cryptographically secure random token of specified length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hash a string using SHA-256
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Create a session identifier with more entropy than the 128-bit floor:
/// SHA-256 over a nanosecond timestamp and a 32-char random component
pub fn create_session_token() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let random_part = generate_secure_token(32);
    let input = format!("{}-{}", timestamp, random_part);

    hash_string(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secure_token() {
        let token = generate_secure_token(32);
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_hash_string() {
        let input = "test string";
        let hash = hash_string(input);
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_create_session_token() {
        let token = create_session_token();
        assert_eq!(token.len(), 64); // SHA-256 produces 64 hex characters

        // Tokens should be unique
        let token2 = create_session_token();
        assert_ne!(token, token2);
    }
}
