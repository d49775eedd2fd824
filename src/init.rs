use crate::api::pixabay::PART_SUFFIX;
use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.output_dir, &cfg.stock_dir, &cfg.audio_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Removes interrupted downloads left behind by a previous run.
pub async fn clear_stale_downloads(stock_dir: &Path) -> Result<usize> {
    if !stock_dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(stock_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension() == Some(OsStr::new(PART_SUFFIX)) {
            match fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(err) => logw(format!("Could not remove {}: {}", path.display(), err)),
            }
        }
    }
    Ok(removed)
}

async fn tool_available(name: &str) -> bool {
    match tokio::process::Command::new(name)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn check_ffmpeg() -> bool {
    tool_available("ffmpeg").await && tool_available("ffprobe").await
}
