//! Full pipeline with a canned model, tone narration, an empty stock source
//! and real ffmpeg. Skipped when ffmpeg lacks what the renderer needs.

use anyhow::Result;
use async_trait::async_trait;
use faceless_factory::api::{ScriptModel, SpeechSynth, StockSource};
use faceless_factory::config::Config;
use faceless_factory::error::StockError;
use faceless_factory::ffmpeg::{ffprobe_duration_seconds, ffprobe_video_dimensions};
use faceless_factory::generator::Pipeline;
use faceless_factory::plan::VideoFormat;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

fn ffmpeg_supports_render() -> bool {
    let listing = |flag: &str| {
        Command::new("ffmpeg")
            .args(["-hide_banner", flag])
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
            .unwrap_or_default()
    };
    let ffprobe_ok = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    let fontconfig = listing("-version").contains("fontconfig");
    let filters = listing("-filters");
    let encoders = listing("-encoders");
    ffprobe_ok
        && fontconfig
        && filters.contains(" drawtext ")
        && filters.contains(" zoompan ")
        && encoders.contains("libx264")
        && encoders.contains(" aac ")
}

struct CannedModel {
    long_sentences: usize,
}

#[async_trait]
impl ScriptModel for CannedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let long: Vec<String> = (1..=self.long_sentences)
            .map(|i| format!("The silent room number {i} waits for you"))
            .collect();
        Ok(format!(
            "LONG_SCRIPT:\n{}.\n\nSHORT_1:\nDarkness is the new luxury. Pay for nothing.\n\n\
             SHORT_2:\nYou would sleep here. Nobody hears you.\n\n\
             SHORT_3:\nThe quietest suite on earth. Booked for years.\n",
            long.join(". ")
        ))
    }
}

/// Writes a sine tone: 30 s for the long script, 3 s for shorts.
struct ToneSynth;

#[async_trait]
impl SpeechSynth for ToneSynth {
    async fn synthesize(&self, _text: &str, out_path: &Path) -> Result<()> {
        let is_long = out_path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("long"))
            .unwrap_or(false);
        let seconds = if is_long { 30 } else { 3 };
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=220:sample_rate=44100:duration={seconds}"))
            .args(["-c:a", "pcm_s16le", "-f", "wav"])
            .arg(out_path)
            .status()
            .await?;
        anyhow::ensure!(status.success(), "tone synthesis failed");
        Ok(())
    }
}

struct EmptyStock;

#[async_trait]
impl StockSource for EmptyStock {
    async fn fetch(&self, _query: &str) -> Result<Vec<PathBuf>, StockError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn renders_fallback_only_videos_of_narration_length() {
    if !ffmpeg_supports_render() {
        eprintln!("skipping: ffmpeg with fontconfig drawtext, zoompan, libx264 and aac not available");
        return;
    }

    let root = tempfile::tempdir().unwrap();
    let cfg = Config {
        output_dir: root.path().join("videos"),
        stock_dir: root.path().join("temp_stock"),
        audio_dir: root.path().join("audio"),
        progress: false,
        ..Config::default()
    };
    let mut pipeline = Pipeline::new(
        cfg,
        Arc::new(CannedModel { long_sentences: 35 }),
        Arc::new(ToneSynth),
        Arc::new(EmptyStock),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.videos.len(), 4);
    assert_eq!(report.output_dir, root.path().join("videos"));

    let long = &report.videos[0];
    assert_eq!(long.format, VideoFormat::Long);
    assert_eq!(long.path, root.path().join("videos/LONG_TODAY.mp4"));
    assert_eq!(long.segments, 30);
    assert_eq!(long.fallback_segments, 30);
    assert!((long.duration - 30.0).abs() < 0.05);

    let seconds = ffprobe_duration_seconds(&long.path).await.unwrap();
    assert!((seconds - 30.0).abs() < 0.15, "long duration {seconds}");
    assert_eq!(
        ffprobe_video_dimensions(&long.path).await.unwrap(),
        (1920, 1080)
    );

    for (i, short) in report.videos[1..].iter().enumerate() {
        let name = format!("SHORT_{}_TODAY.mp4", i + 1);
        assert_eq!(short.path, root.path().join("videos").join(&name));
        assert_eq!(short.format, VideoFormat::Short);
        assert_eq!(short.segments, 2);
        let seconds = ffprobe_duration_seconds(&short.path).await.unwrap();
        assert!((seconds - 3.0).abs() < 0.15, "{name} duration {seconds}");
        assert_eq!(
            ffprobe_video_dimensions(&short.path).await.unwrap(),
            (1080, 1920)
        );
    }

    assert!(root.path().join("audio/long_audio.mp3").exists());
    assert!(root.path().join("audio/short_3_audio.mp3").exists());
}
