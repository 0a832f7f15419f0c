//! Webhook Forwarder
//!
//! POSTs each captured contact as JSON to the configured endpoint. A failed
//! first attempt is handed to a background task that redelivers with bounded
//! exponential backoff, so the caller never waits on retries.

mod retry;

pub use retry::{DeliveryOutcome, RetryPolicy};

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Contact record sent to the webhook. Built once per inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedMessage {
    pub name: String,
    pub number: String,
    pub first_message: String,
}

impl CapturedMessage {
    /// Name for log lines, falling back to the number.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.number
        } else {
            &self.name
        }
    }
}

/// Result of [`WebhookForwarder::deliver`].
#[derive(Debug)]
pub struct Delivery {
    /// Whether the first attempt was accepted.
    pub delivered: bool,
    /// Background redelivery, present only when the first attempt failed.
    pub retry: Option<JoinHandle<DeliveryOutcome>>,
}

#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: String,
    user_agent: String,
    policy: RetryPolicy,
}

impl WebhookForwarder {
    pub fn new(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            user_agent: user_agent.into(),
            policy,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver `record`, returning whether the first attempt succeeded.
    ///
    /// On failure a redelivery task is left running in the background.
    pub async fn forward(&self, record: &CapturedMessage) -> bool {
        self.deliver(record.clone()).await.delivered
    }

    /// Like [`forward`](Self::forward) but hands back the redelivery task.
    pub async fn deliver(&self, record: CapturedMessage) -> Delivery {
        tracing::info!("Webhook: sending contact {}", record.label());

        match self.post(&record).await {
            Ok(()) => {
                tracing::info!("Webhook: delivered contact {}", record.label());
                Delivery {
                    delivered: true,
                    retry: None,
                }
            }
            Err(e) => {
                tracing::error!("Webhook: delivery of {} failed: {}", record.label(), e);
                if self.policy.max_retries == 0 {
                    return Delivery {
                        delivered: false,
                        retry: None,
                    };
                }
                let forwarder = self.clone();
                let handle = tokio::spawn(async move { forwarder.redeliver(record, e).await });
                Delivery {
                    delivered: false,
                    retry: Some(handle),
                }
            }
        }
    }

    async fn redeliver(self, record: CapturedMessage, first_error: Error) -> DeliveryOutcome {
        let mut last_error = first_error.to_string();

        for retry in 0..self.policy.max_retries {
            let delay = self.policy.delay_for(retry);
            tracing::info!(
                "Webhook: retrying {} in {:.1}s ({}/{})",
                record.label(),
                delay.as_secs_f64(),
                retry + 1,
                self.policy.max_retries
            );
            tokio::time::sleep(delay).await;

            match self.post(&record).await {
                Ok(()) => {
                    tracing::info!("Webhook: delivered contact {} on retry", record.label());
                    return DeliveryOutcome::Delivered {
                        attempts: retry + 2,
                    };
                }
                Err(e) => {
                    tracing::warn!("Webhook: retry for {} failed: {}", record.label(), e);
                    last_error = e.to_string();
                }
            }
        }

        let attempts = self.policy.max_retries + 1;
        tracing::error!(
            "Webhook: giving up on {} after {} attempts: {}",
            record.label(),
            attempts,
            last_error
        );
        DeliveryOutcome::Exhausted {
            attempts,
            last_error,
        }
    }

    async fn post(&self, record: &CapturedMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .json(record)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Error::WebhookStatus(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn record() -> CapturedMessage {
        CapturedMessage {
            name: "Ana".to_string(),
            number: "5511999999999".to_string(),
            first_message: "Hi".to_string(),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
        }
    }

    fn forwarder(url: String, policy: RetryPolicy) -> WebhookForwarder {
        WebhookForwarder::new(url, "WhatsApp-Captador/1.0", Duration::from_secs(5), policy)
            .unwrap()
    }

    #[test]
    fn test_record_json_shape() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(
            value,
            json!({"name": "Ana", "number": "5511999999999", "firstMessage": "Hi"})
        );
    }

    #[test]
    fn test_label_falls_back_to_number() {
        let mut r = record();
        r.name.clear();
        assert_eq!(r.label(), "5511999999999");
    }

    #[tokio::test]
    async fn test_forward_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_header("user-agent", "WhatsApp-Captador/1.0")
            .match_body(Matcher::Json(json!({
                "name": "Ana",
                "number": "5511999999999",
                "firstMessage": "Hi"
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let forwarder = forwarder(format!("{}/hook", server.url()), fast_policy(3));
        assert!(forwarder.forward(&record()).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_schedules_single_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let forwarder = forwarder(format!("{}/hook", server.url()), fast_policy(1));
        let delivery = forwarder.deliver(record()).await;
        assert!(!delivery.delivered);

        let outcome = delivery.retry.expect("retry scheduled").await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Exhausted {
                attempts: 2,
                last_error: "webhook returned status 500".to_string(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failure() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/hook")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let forwarder = forwarder(format!("{}/hook", server.url()), fast_policy(3));
        let delivery = forwarder.deliver(record()).await;
        assert!(!delivery.delivered);

        let outcome = delivery.retry.unwrap().await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 2 });
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_first_retry_waits_initial_delay() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let forwarder = forwarder(format!("{}/hook", server.url()), policy);
        let delivery = forwarder.deliver(record()).await;
        assert!(!delivery.delivered);
        let retry = delivery.retry.unwrap();

        // Freeze the clock, then let the redelivery task arm its sleep.
        tokio::time::pause();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        tokio::time::advance(Duration::from_millis(4_990)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!retry.is_finished());
        assert!(!ok.matched_async().await);

        // Past the 5s delay: the retry fires. HTTP runs on the real clock.
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::time::resume();
        let outcome = retry.await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 2 });
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(201)
            .create_async()
            .await;

        let forwarder = forwarder(format!("{}/hook", server.url()), fast_policy(0));
        let delivery = forwarder.deliver(record()).await;
        assert!(!delivery.delivered);
        assert!(delivery.retry.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_returns_false() {
        // Port 9 (discard) is closed on CI hosts; the connect error must not panic.
        let forwarder = forwarder("http://127.0.0.1:9/hook".to_string(), fast_policy(0));
        assert!(!forwarder.forward(&record()).await);
    }
}
