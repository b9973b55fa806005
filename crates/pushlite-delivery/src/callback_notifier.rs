//! Outcome webhook notifications.
//!
//! Each outcome with a callback URL gets exactly one POST attempt bounded by a
//! client timeout. Failures are logged and counted, never retried. Concurrent
//! callbacks are capped by a semaphore; when the cap is reached the caller
//! waits for a permit instead of spawning without bound. Shutdown reclaims
//! every permit to wait out callbacks still running in the background.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::redirect::Policy;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::delivery_stats::PushDeliveryStats;
use crate::push_contract::DeliveryOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Public struct `CallbackNotifierConfig` used across pushlite components.
pub struct CallbackNotifierConfig {
    pub timeout_ms: u64,
    /// Maximum concurrently running callback tasks; `0` posts inline.
    pub max_in_flight: usize,
}

impl Default for CallbackNotifierConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_in_flight: 16,
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates failures of a single callback attempt.
pub enum CallbackDeliveryError {
    #[error("callback timed out")]
    Timeout,
    #[error("callback endpoint responded with status {status}")]
    Status { status: u16 },
    #[error("callback transport failed: {0}")]
    Transport(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
/// Public struct `CallbackNotifier` used across pushlite components.
pub struct CallbackNotifier {
    client: reqwest::Client,
    permits: Option<Arc<Semaphore>>,
    max_in_flight: usize,
    stats: Arc<PushDeliveryStats>,
}

impl CallbackNotifier {
    pub fn new(config: CallbackNotifierConfig, stats: Arc<PushDeliveryStats>) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(anyhow!("callback timeout must be greater than 0"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .context("failed to build callback http client")?;
        Ok(Self {
            client,
            permits: (config.max_in_flight > 0)
                .then(|| Arc::new(Semaphore::new(config.max_in_flight))),
            max_in_flight: config.max_in_flight,
            stats,
        })
    }

    /// Reports `outcome` to `callback_url`, if any.
    ///
    /// With a fan-out bound configured this returns as soon as a permit is
    /// acquired and the POST runs on its own task; otherwise the POST runs
    /// inline and this returns after the single attempt finished.
    pub async fn notify(&self, callback_url: Option<&str>, outcome: DeliveryOutcome) {
        let Some(url) = callback_url.map(str::trim).filter(|url| !url.is_empty()) else {
            tracing::debug!(
                message_id = outcome.message_id.as_str(),
                success = outcome.success,
                "no callback url; outcome recorded in logs only"
            );
            return;
        };
        let url = url.to_string();

        let Some(permits) = self.permits.as_ref() else {
            self.report(&url, &outcome).await;
            return;
        };
        let permit = match Arc::clone(permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Closed semaphore: never expected, fall back to inline delivery.
                self.report(&url, &outcome).await;
                return;
            }
        };
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.report(&url, &outcome).await;
            drop(permit);
        });
    }

    /// Performs one POST of `outcome` to `url`.
    pub async fn post_outcome(
        &self,
        url: &str,
        outcome: &DeliveryOutcome,
    ) -> Result<(), CallbackDeliveryError> {
        let response = self
            .client
            .post(url)
            .json(outcome)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    CallbackDeliveryError::Timeout
                } else {
                    CallbackDeliveryError::Transport(error)
                }
            })?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(CallbackDeliveryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Number of callback tasks currently holding a fan-out permit.
    pub fn in_flight(&self) -> usize {
        self.permits.as_ref().map_or(0, |permits| {
            self.max_in_flight
                .saturating_sub(permits.available_permits())
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Resolves once every spawned callback task has released its permit.
    /// Inline notifiers have nothing in the background and resolve at once.
    pub async fn wait_idle(&self) {
        let Some(permits) = self.permits.as_ref() else {
            return;
        };
        let total = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        if let Ok(all) = permits.acquire_many(total).await {
            drop(all);
        }
    }

    async fn report(&self, url: &str, outcome: &DeliveryOutcome) {
        match self.post_outcome(url, outcome).await {
            Ok(()) => {
                self.stats.record_callback(true);
                tracing::debug!(
                    message_id = outcome.message_id.as_str(),
                    callback_url = url,
                    "callback delivered"
                );
            }
            Err(CallbackDeliveryError::Status { status }) => {
                self.stats.record_callback(false);
                tracing::warn!(
                    message_id = outcome.message_id.as_str(),
                    callback_url = url,
                    status,
                    "callback endpoint rejected outcome"
                );
            }
            Err(error) => {
                self.stats.record_callback(false);
                tracing::error!(
                    message_id = outcome.message_id.as_str(),
                    callback_url = url,
                    error = %error,
                    "callback delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    use super::*;

    fn notifier(config: CallbackNotifierConfig) -> (CallbackNotifier, Arc<PushDeliveryStats>) {
        let stats = Arc::new(PushDeliveryStats::default());
        let notifier = CallbackNotifier::new(config, Arc::clone(&stats)).expect("notifier");
        (notifier, stats)
    }

    async fn wait_for_callbacks(stats: &PushDeliveryStats, expected: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while stats.snapshot().callbacks_attempted() < expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {expected} callbacks"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn regression_zero_timeout_is_rejected() {
        let stats = Arc::new(PushDeliveryStats::default());
        assert!(CallbackNotifier::new(
            CallbackNotifierConfig {
                timeout_ms: 0,
                max_in_flight: 1,
            },
            stats,
        )
        .is_err());
    }

    #[tokio::test]
    async fn integration_post_outcome_sends_failure_payload() {
        let server = MockServer::start();
        let callback = server.mock(|when, then| {
            when.method(POST).path("/hook").json_body(json!({
                "message_id": "m-1",
                "success": false,
                "error": "network timeout",
            }));
            then.status(204);
        });
        let (notifier, _) = notifier(CallbackNotifierConfig::default());
        notifier
            .post_outcome(
                &server.url("/hook"),
                &DeliveryOutcome::failed("m-1", "network timeout"),
            )
            .await
            .expect("callback accepted");
        callback.assert_calls(1);
    }

    #[tokio::test]
    async fn functional_notify_inline_records_success_and_status_failures() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(POST).path("/ok");
            then.status(200);
        });
        let rejected = server.mock(|when, then| {
            when.method(POST).path("/rejected");
            then.status(500);
        });
        let (notifier, stats) = notifier(CallbackNotifierConfig {
            timeout_ms: 2_000,
            max_in_flight: 0,
        });

        notifier
            .notify(Some(&server.url("/ok")), DeliveryOutcome::delivered("m-1"))
            .await;
        notifier
            .notify(
                Some(&server.url("/rejected")),
                DeliveryOutcome::delivered("m-2"),
            )
            .await;

        ok.assert_calls(1);
        rejected.assert_calls(1);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.callbacks_delivered, 1);
        assert_eq!(snapshot.callbacks_failed, 1);
    }

    #[tokio::test]
    async fn functional_notify_without_url_is_a_no_op() {
        let (notifier, stats) = notifier(CallbackNotifierConfig::default());
        notifier.notify(None, DeliveryOutcome::delivered("m-1")).await;
        notifier
            .notify(Some("   "), DeliveryOutcome::delivered("m-2"))
            .await;
        assert_eq!(stats.snapshot().callbacks_attempted(), 0);
    }

    #[tokio::test]
    async fn functional_spawned_callbacks_complete_in_background() {
        let server = MockServer::start();
        let hook = server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(200);
        });
        let (notifier, stats) = notifier(CallbackNotifierConfig {
            timeout_ms: 2_000,
            max_in_flight: 2,
        });
        for index in 0..5 {
            notifier
                .notify(
                    Some(&server.url("/hook")),
                    DeliveryOutcome::delivered(format!("m-{index}")),
                )
                .await;
        }
        wait_for_callbacks(&stats, 5).await;
        hook.assert_calls(5);
        assert_eq!(stats.snapshot().callbacks_delivered, 5);
    }

    #[tokio::test]
    async fn functional_wait_idle_returns_after_spawned_callbacks_finish() {
        let server = MockServer::start();
        let hook = server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(200).delay(Duration::from_millis(200));
        });
        let (notifier, stats) = notifier(CallbackNotifierConfig {
            timeout_ms: 2_000,
            max_in_flight: 4,
        });
        for index in 0..3 {
            notifier
                .notify(
                    Some(&server.url("/hook")),
                    DeliveryOutcome::delivered(format!("m-{index}")),
                )
                .await;
        }
        assert_eq!(stats.snapshot().callbacks_attempted(), 0);

        notifier.wait_idle().await;
        hook.assert_calls(3);
        assert_eq!(stats.snapshot().callbacks_delivered, 3);
        assert_eq!(notifier.in_flight(), 0);

        let (inline, _) = self::notifier(CallbackNotifierConfig {
            timeout_ms: 500,
            max_in_flight: 0,
        });
        inline.wait_idle().await;
    }

    #[tokio::test]
    async fn regression_slow_callback_is_cut_off_by_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });
        let (notifier, stats) = notifier(CallbackNotifierConfig {
            timeout_ms: 50,
            max_in_flight: 0,
        });
        let error = notifier
            .post_outcome(&server.url("/slow"), &DeliveryOutcome::delivered("m-1"))
            .await
            .expect_err("timeout");
        assert!(matches!(error, CallbackDeliveryError::Timeout));

        let started = std::time::Instant::now();
        notifier
            .notify(Some(&server.url("/slow")), DeliveryOutcome::delivered("m-2"))
            .await;
        assert!(started.elapsed() < Duration::from_millis(450));
        assert_eq!(stats.snapshot().callbacks_failed, 1);
    }

    #[tokio::test]
    async fn regression_unreachable_callback_is_swallowed() {
        let (notifier, stats) = notifier(CallbackNotifierConfig {
            timeout_ms: 500,
            max_in_flight: 0,
        });
        notifier
            .notify(
                Some("http://127.0.0.1:1/unreachable"),
                DeliveryOutcome::failed("m-1", "boom"),
            )
            .await;
        assert_eq!(stats.snapshot().callbacks_failed, 1);
    }
}
