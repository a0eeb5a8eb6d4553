//! Thin LLM client behind the `ReviewModel` seam.

use std::time::Duration;

use tracing::debug;

use crate::errors::{CrResult, LlmError};
use crate::review::ReviewModel;

/// Model endpoint configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Per-call transport timeout.
    pub request_timeout: Duration,
}

impl LlmConfig {
    /// Reads `OLLAMA_URL` / `OLLAMA_MODEL` / `OLLAMA_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let endpoint =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "qwen3:32b".to_string());
        let request_timeout = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));
        Self {
            endpoint,
            model,
            request_timeout,
        }
    }
}

/// Non-streaming `/api/generate` client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    cfg: LlmConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmConfig) -> CrResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .http2_keep_alive_interval(Some(Duration::from_secs(20)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .build()
            .map_err(LlmError::from)?;
        Ok(Self { http, cfg })
    }

    async fn generate_raw(&self, prompt: &str) -> Result<String, LlmError> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            response: String,
        }

        let url = format!("{}/api/generate", self.cfg.endpoint.trim_end_matches('/'));
        debug!("llm.generate model={} url={}", self.cfg.model, url);
        let resp = self
            .http
            .post(&url)
            .json(&Req {
                model: &self.cfg.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LlmError::HttpStatus(resp.status().as_u16()));
        }
        let body: Resp = resp.json().await?;
        Ok(body.response)
    }
}

impl ReviewModel for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_raw(prompt).await
    }
}
