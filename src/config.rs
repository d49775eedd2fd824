use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const GROQ_KEY_ENV: &str = "GROQ_API_KEY";
pub const ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";
pub const PIXABAY_KEY_ENV: &str = "PIXABAY_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub topic: String,

    #[serde(skip_serializing)]
    pub groq_key: String,
    pub groq_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,

    #[serde(skip_serializing)]
    pub elevenlabs_key: String,
    pub elevenlabs_base_url: String,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,

    #[serde(skip_serializing)]
    pub pixabay_key: String,
    pub pixabay_base_url: String,
    pub stock_style: String,

    pub output_dir: PathBuf,
    pub stock_dir: PathBuf,
    pub audio_dir: PathBuf,

    pub encoder_threads: u32,
    pub encoder_preset: String,
    /// fontconfig family name used when `caption_font_file` is unset.
    pub caption_font: String,
    pub caption_font_file: Option<PathBuf>,

    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topic: "Luxury Dark Retreats and High-End Sensory Deprivation Experiences".to_string(),
            groq_key: String::new(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model: "llama-3.3-70b-versatile".to_string(),
            llm_temperature: 0.85,
            llm_max_tokens: 4096,
            elevenlabs_key: String::new(),
            elevenlabs_base_url: "https://api.elevenlabs.io/v1".to_string(),
            eleven_voice_id: "TX3LPaxmHKxFdv7VOQHJ".to_string(),
            eleven_model_id: "eleven_multilingual_v2".to_string(),
            pixabay_key: String::new(),
            pixabay_base_url: "https://pixabay.com/api/videos/".to_string(),
            stock_style: "cinematic dark mystery luxury".to_string(),
            output_dir: PathBuf::from("videos"),
            stock_dir: PathBuf::from("temp_stock"),
            audio_dir: PathBuf::from("."),
            encoder_threads: 8,
            encoder_preset: "ultrafast".to_string(),
            caption_font: "Impact".to_string(),
            caption_font_file: None,
            progress: true,
        }
    }
}

impl Config {
    /// Reads `path` if it exists (defaults otherwise), then overlays API keys
    /// from the environment and validates the required ones.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if fs::metadata(path).await.is_ok() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str, current: &mut String| {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *current = value.trim().to_string();
            }
        };
        pick(GROQ_KEY_ENV, &mut self.groq_key);
        pick(ELEVENLABS_KEY_ENV, &mut self.elevenlabs_key);
        pick(PIXABAY_KEY_ENV, &mut self.pixabay_key);
    }

    pub fn validate(&self) -> Result<()> {
        if self.groq_key.is_empty() {
            anyhow::bail!("{GROQ_KEY_ENV} missing");
        }
        if self.elevenlabs_key.is_empty() {
            anyhow::bail!("{ELEVENLABS_KEY_ENV} missing");
        }
        if self.topic.trim().is_empty() {
            anyhow::bail!("config: topic is empty");
        }
        if self.encoder_threads == 0 {
            anyhow::bail!("config: encoder_threads must be at least 1");
        }
        Ok(())
    }

    pub fn stock_enabled(&self) -> bool {
        !self.pixabay_key.is_empty()
    }
}
