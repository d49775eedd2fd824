//! External services behind the pipeline stages.

use crate::error::StockError;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod elevenlabs;
pub mod groq;
pub mod pixabay;

/// A text completion service.
#[async_trait]
pub trait ScriptModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Writes narration for `text` to `out_path`.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()>;
}

/// Local clip files matching `query`; an empty list means no matches.
#[async_trait]
pub trait StockSource: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<PathBuf>, StockError>;
}

pub(crate) fn body_snippet(raw: &str) -> String {
    raw.chars().take(800).collect()
}
