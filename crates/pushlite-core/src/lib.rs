//! Foundational low-level utilities shared across pushlite crates.
//!
//! Provides time helpers used for admission/outcome timestamps and the bearer
//! secret helpers used by the gateway auth gate and startup token bootstrap.

pub mod secret_token;
pub mod time_utils;

pub use secret_token::{bearer_token_matches, generate_bearer_token, GENERATED_TOKEN_LEN};
pub use time_utils::{current_unix_timestamp_ms, duration_to_ms, elapsed_ms_since};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn unit_elapsed_ms_since_saturates_for_future_timestamps() {
        let now = current_unix_timestamp_ms();
        assert_eq!(elapsed_ms_since(now.saturating_add(60_000)), 0);
        assert!(elapsed_ms_since(now.saturating_sub(1_000)) >= 1_000);
    }

    #[test]
    fn unit_duration_to_ms_clamps_oversized_durations() {
        assert_eq!(duration_to_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_to_ms(Duration::MAX), u64::MAX);
    }
}
