/// Staff invite tokens
///
/// An invite token is handed to the invited person once (by whatever channel
/// the owner chooses) and exchanged for a staff account. Only the SHA-256
/// hash is stored, so a database leak does not leak usable invites.
///
/// # Format
///
/// `inv_` followed by 40 base62 characters (44 chars total).
///
/// ```
/// use bookdesk_shared::auth::token::{generate_invite_token, hash_invite_token, validate_invite_token_format};
///
/// let (token, hash) = generate_invite_token();
/// assert!(token.starts_with("inv_"));
/// assert!(validate_invite_token_format(&token));
/// assert_eq!(hash_invite_token(&token), hash);
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_RANDOM_LENGTH: usize = 40;

const TOKEN_PREFIX: &str = "inv_";

/// Total length of an invite token
pub const INVITE_TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

/// Generates a new invite token, returning `(plaintext, sha256_hex)`
pub fn generate_invite_token() -> (String, String) {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    let random_part: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{}{}", TOKEN_PREFIX, random_part);
    let hash = hash_invite_token(&token);

    (token, hash)
}

/// Hex-encoded SHA-256 of a token
pub fn hash_invite_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check before touching the database
pub fn validate_invite_token_format(token: &str) -> bool {
    token.len() == INVITE_TOKEN_LENGTH
        && token
            .strip_prefix(TOKEN_PREFIX)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique() {
        let (first, first_hash) = generate_invite_token();
        let (second, second_hash) = generate_invite_token();

        assert_ne!(first, second);
        assert_ne!(first_hash, second_hash);
        assert_eq!(first.len(), INVITE_TOKEN_LENGTH);
        assert_eq!(first_hash.len(), 64);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_invite_token("inv_abc"), hash_invite_token("inv_abc"));
        assert_ne!(hash_invite_token("inv_abc"), hash_invite_token("inv_abd"));
    }

    #[test]
    fn test_validate_format() {
        let (token, _) = generate_invite_token();
        assert!(validate_invite_token_format(&token));

        assert!(!validate_invite_token_format("inv_short"));
        assert!(!validate_invite_token_format(&token.replacen("inv_", "key_", 1)));

        let mut bad = token.clone();
        bad.replace_range(10..11, "!");
        assert!(!validate_invite_token_format(&bad));
    }
}
