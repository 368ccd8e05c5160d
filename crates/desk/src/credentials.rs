use std::num::NonZeroU32;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ring::{digest, pbkdf2};
use ring::rand::{SecureRandom, SystemRandom};

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SESSION_TOKEN_LEN: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0_u8; N];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow!("system random source unavailable"))?;
    Ok(bytes)
}

/// Encodes as `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = random_bytes::<SALT_LEN>()?;
    let iterations =
        NonZeroU32::new(PBKDF2_ITERATIONS).context("pbkdf2 iterations must be non-zero")?;
    let mut hash = [0_u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut hash,
    );
    Ok(format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash)) else {
        return false;
    };
    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

pub fn new_session_token() -> Result<String> {
    let bytes = random_bytes::<SESSION_TOKEN_LEN>()?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Reset tokens are stored only as this digest.
pub fn reset_token_digest(token: &str) -> String {
    let digest = digest::digest(&digest::SHA256, token.trim().as_bytes());
    URL_SAFE_NO_PAD.encode(digest.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("trail-mix-42").expect("hash");
        let second = hash_password("trail-mix-42").expect("hash");
        assert_ne!(first, second);
        assert!(first.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("trail-mix-42", &first));
        assert!(!verify_password("trail-mix-43", &first));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$aa$bb"));
        assert!(!verify_password("x", "pbkdf2-sha256$0$aa$bb"));
    }

    #[test]
    fn session_tokens_are_url_safe() {
        let token = new_session_token().expect("token");
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }

    #[test]
    fn reset_digest_is_stable_and_hides_the_token() {
        let token = new_session_token().expect("token");
        let digest = reset_token_digest(&token);
        assert_eq!(digest, reset_token_digest(&format!(" {token} ")));
        assert_ne!(digest, token);
        assert_ne!(digest, reset_token_digest("other"));
    }
}
