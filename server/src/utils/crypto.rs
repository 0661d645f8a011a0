//! Cryptographic utility functions

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate a cryptographically secure random key
pub fn generate_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Generate a cryptographically secure random hex token
pub fn generate_token(byte_len: usize) -> String {
    hex::encode(generate_key(byte_len))
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Calculate SHA256 hash and return as hex string
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Calculate HMAC-SHA256 over `data` with `key` and return as hex string.
///
/// Used for webhook payload signatures and Graph API appsecret proofs.
pub fn hmac_sha256_hex(key: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_length() {
        assert_eq!(generate_key(16).len(), 16);
        assert_eq!(generate_key(32).len(), 32);
        assert_eq!(generate_key(64).len(), 64);
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token(32);
        assert_eq!(token.len(), 64); // 32 bytes = 64 hex chars
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let t1 = generate_token(32);
        let t2 = generate_token(32);
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(!constant_time_eq("", "x"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hmac_sha256_hex_rfc4231_case2() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        assert_eq!(
            hmac_sha256_hex("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_sha256_hex_differs_by_key() {
        let body = b"{\"object\":\"page\"}";
        assert_ne!(hmac_sha256_hex("a", body), hmac_sha256_hex("b", body));
    }

    #[test]
    fn test_hmac_sha256_hex_differs_by_body() {
        assert_ne!(
            hmac_sha256_hex("secret", b"payload-one"),
            hmac_sha256_hex("secret", b"payload-two")
        );
    }
}
