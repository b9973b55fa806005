//! Bearer secret generation and comparison.
//!
//! Comparison hashes both sides before comparing so that neither the position
//! of the first mismatching byte nor the secret length is observable through
//! response timing.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of tokens produced by [`generate_bearer_token`].
pub const GENERATED_TOKEN_LEN: usize = 43;

/// Generates a random URL-safe bearer token.
pub fn generate_bearer_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Returns true when `observed` equals `expected`.
pub fn bearer_token_matches(observed: &str, expected: &str) -> bool {
    let observed_digest = Sha256::digest(observed.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());
    let diff = observed_digest
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (left, right)| acc | (left ^ right));
    diff == 0
}
