//! Result delivery to the configured callback target
//!
//! Delivery is fire-and-forget from the engine's perspective: a failed POST is
//! logged and dropped, never retried, and never affects job finalization.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultCallback<'a> {
    job_id: &'a str,
    success: bool,
    output: &'a str,
}

#[async_trait]
pub trait ResultNotifier: Send + Sync {
    async fn notify(&self, job_id: &str, success: bool, output: &str);
}

/// POSTs finalized results as JSON to a fixed URL.
pub struct CallbackNotifier {
    client: reqwest::Client,
    url: String,
}

impl CallbackNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ResultNotifier for CallbackNotifier {
    async fn notify(&self, job_id: &str, success: bool, output: &str) {
        let body = ResultCallback {
            job_id,
            success,
            output,
        };
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("callback delivered for job {}", job_id);
            }
            Ok(response) => {
                log::warn!(
                    "callback for job {} answered {}",
                    job_id,
                    response.status()
                );
            }
            Err(e) => {
                log::warn!("callback for job {} failed: {}", job_id, e);
            }
        }
    }
}

/// Used when no callback URL is configured.
pub struct NoopNotifier;

#[async_trait]
impl ResultNotifier for NoopNotifier {
    async fn notify(&self, _job_id: &str, _success: bool, _output: &str) {}
}
