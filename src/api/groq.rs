use crate::api::{ScriptModel, body_snippet};
use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT_S: u64 = 300;

fn log_api_error(root: &serde_json::Value) -> bool {
    let Some(err) = root.get("error") else {
        return false;
    };
    if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
        logw(format!("Groq error message: {}", msg));
    }
    if let Some(typ) = err.get("type").and_then(|v| v.as_str()) {
        logw(format!("Groq error type: {}", typ));
    }
    if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
        logw(format!("Groq error code: {}", code));
    }
    true
}

/// Pulls `choices[0].message.content` out of a chat-completions body.
fn chat_extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;
    if log_api_error(&root) {
        return None;
    }

    root.get("choices")?
        .as_array()?
        .iter()
        .filter_map(|choice| choice.get("message")?.get("content")?.as_str())
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqClient {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.groq_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.groq_key.clone(),
            model: cfg.llm_model.clone(),
            temperature: cfg.llm_temperature,
            max_tokens: cfg.llm_max_tokens,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ScriptModel for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_S))
            .send()
            .await
            .context("Groq request failed")?;

        let status = resp.status();
        let raw = resp.text().await.context("Groq response read failed")?;

        if !status.is_success() {
            if let Ok(root) = serde_json::from_str::<serde_json::Value>(&raw) {
                log_api_error(&root);
            }
            anyhow::bail!("Groq HTTP {}: {}", status.as_u16(), body_snippet(&raw));
        }

        let text = chat_extract_output_text(&raw).with_context(|| {
            format!("Groq response parse failed: {}", body_snippet(&raw))
        })?;
        logi(format!("Groq completion received: {} chars", text.chars().count()));
        Ok(text)
    }
}
