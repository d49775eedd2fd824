use crate::api::{SpeechSynth, body_snippet};
use crate::config::Config;
use crate::logok;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub struct ElevenLabsTts {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsTts {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.elevenlabs_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url, self.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynth for ElevenLabsTts {
    async fn synthesize(&self, text: &str, out_mp3_path: &Path) -> Result<()> {
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(self.url())
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .context("ElevenLabs request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "ElevenLabs TTS failed HTTP {}: {}",
                status.as_u16(),
                body_snippet(&raw)
            );
        }

        let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
        if bytes.is_empty() {
            anyhow::bail!("ElevenLabs returned empty audio");
        }
        if let Some(parent) = out_mp3_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_mp3_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;

        logok(format!(
            "Narration written: {} ({} bytes)",
            out_mp3_path.display(),
            bytes.len()
        ));
        Ok(())
    }
}
