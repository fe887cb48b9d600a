use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PomodexError, Result};

/// Claims carried by the short-lived access token. Subject is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn encode_access_token(user_id: &str, signing_key: &str, ttl_secs: i64, now: i64) -> Result<String> {
    let claims = AccessClaims { sub: user_id.to_string(), iat: now, exp: now + ttl_secs };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(signing_key.as_bytes()))
        .map_err(|e| PomodexError::Backend(format!("signing access token: {e}")))
}

/// Decodes and validates an access token, rejecting bad signatures and past
/// expiry. Callers never inspect the token shape beyond these claims.
pub fn decode_access_token(token: &str, signing_key: &str) -> Result<AccessClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // jsonwebtoken defaults to a 60s leeway; the spec's expiry boundary is
    // exact (rejected at exp+1s), so there's no grace window here.
    validation.leeway = 0;
    decode::<AccessClaims>(token, &DecodingKey::from_secret(signing_key.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| PomodexError::Auth)
}

/// Generates 32 bytes of randomness, URL-safely encoded. The plaintext is
/// returned to the caller once and never persisted; `hash_refresh_token`
/// computes what the store keeps.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

pub fn hash_refresh_token(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    hex::encode(digest)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let token = encode_access_token("user-1", "secret", 900, 1_000).unwrap();
        let claims = decode_access_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp, 1_900);
    }

    #[test]
    fn wrong_signing_key_is_rejected() {
        let token = encode_access_token("user-1", "secret", 900, 1_000).unwrap();
        let err = decode_access_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, PomodexError::Auth));
    }

    #[test]
    fn refresh_token_hash_is_deterministic_and_not_the_plaintext() {
        let token = generate_refresh_token();
        let hash_a = hash_refresh_token(&token);
        let hash_b = hash_refresh_token(&token);
        assert_eq!(hash_a, hash_b);
        assert_ne!(hash_a, token);
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
    }
}
