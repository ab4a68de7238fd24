use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use lakeflow_core::config::ModelConfig;
use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::traits::TextGenerator;

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Qwen, etc.
///
/// Non-streaming: synthesis prompts are small and the callers want the whole
/// completion before parsing it anyway.
pub struct OpenAiClient {
    http: Client,
    config: ModelConfig,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        Self {
            http: Client::new(),
            config,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl TextGenerator for OpenAiClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let body = ChatRequest {
                model: self.config.model.clone(),
                messages: vec![OaiMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
                max_tokens: self.config.max_tokens,
                temperature: if self.config.temperature > 0.0 {
                    Some(self.config.temperature)
                } else {
                    None
                },
                stream: false,
            };

            let mut req = self.http.post(self.endpoint()).json(&body);
            if let Some(api_key) = &self.api_key {
                req = req.header("Authorization", format!("Bearer {api_key}"));
            }

            let response = req
                .send()
                .await
                .map_err(|e| LakeflowError::Generation(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(LakeflowError::Generation(format!("HTTP {status}: {body}")));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| LakeflowError::Generation(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| LakeflowError::Generation("empty completion".to_string()))
        })
    }
}
