use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use lakeflow_core::config::ModelConfig;
use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::traits::TextGenerator;

/// A text generator that retries transient failures with exponential backoff.
pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
    initial_backoff_ms: u64,
}

const MAX_BACKOFF_MS: u64 = 30_000;

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, config: &ModelConfig) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
        }
    }
}

fn is_retryable(e: &LakeflowError) -> bool {
    match e {
        LakeflowError::Generation(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn backoff(attempt: u32, initial_ms: u64) -> Duration {
    let ms = (initial_ms * 2u64.pow(attempt)).min(MAX_BACKOFF_MS);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut last_err = None;
            for attempt in 0..=self.max_retries {
                match self.inner.generate(prompt).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if is_retryable(&e) && attempt < self.max_retries {
                            let delay = backoff(attempt, self.initial_backoff_ms);
                            warn!(
                                attempt = attempt + 1,
                                max_retries = self.max_retries,
                                backoff_ms = delay.as_millis() as u64,
                                error = %e,
                                "retrying generation request"
                            );
                            tokio::time::sleep(delay).await;
                            last_err = Some(e);
                            continue;
                        }
                        return Err(e);
                    }
                }
            }
            Err(last_err
                .unwrap_or_else(|| LakeflowError::Generation("request never attempted".into())))
        })
    }
}
