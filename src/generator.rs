use crate::api::elevenlabs::ElevenLabsTts;
use crate::api::groq::GroqClient;
use crate::api::pixabay::PixabayStock;
use crate::api::{ScriptModel, SpeechSynth, StockSource};
use crate::assembler::{RenderedVideo, VideoAssembler};
use crate::config::Config;
use crate::init;
use crate::progress::Progress;
use crate::script::{ScriptSet, build_prompt};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const START_BANNER: &str = "VOID SANCTUARY LUXURY BATCH STARTING";
pub const DONE_BANNER: &str = "ALL VIDEOS DONE - CHECK 'videos' FOLDER - VOID SANCTUARY READY";

#[derive(Debug)]
pub struct RunReport {
    pub scripts: ScriptSet,
    pub videos: Vec<RenderedVideo>,
    /// Where the videos were written; `DONE_BANNER` always names `videos`.
    pub output_dir: PathBuf,
}

pub struct Pipeline {
    cfg: Config,
    model: Arc<dyn ScriptModel>,
    tts: Arc<dyn SpeechSynth>,
    assembler: VideoAssembler,
    progress: Progress,
}

impl Pipeline {
    pub fn new(
        cfg: Config,
        model: Arc<dyn ScriptModel>,
        tts: Arc<dyn SpeechSynth>,
        stock: Arc<dyn StockSource>,
    ) -> Self {
        let assembler = VideoAssembler::new(&cfg, stock);
        let progress = Progress::new(cfg.progress);
        Self {
            cfg,
            model,
            tts,
            assembler,
            progress,
        }
    }

    /// Wires the Groq, ElevenLabs and Pixabay clients over one HTTP client.
    pub fn from_config(cfg: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        if !cfg.stock_enabled() {
            logw("PIXABAY_API_KEY not set; every segment will use the fallback visual.");
        }

        let model = Arc::new(GroqClient::new(client.clone(), &cfg));
        let tts = Arc::new(ElevenLabsTts::new(client.clone(), &cfg));
        let stock = Arc::new(PixabayStock::new(client, &cfg));
        Ok(Self::new(cfg, model, tts, stock))
    }

    pub fn output_dir(&self) -> &Path {
        &self.cfg.output_dir
    }

    pub async fn generate_content(&self) -> Result<ScriptSet> {
        let spinner = self.progress.spinner("Generating scripts...");
        let raw = self.model.complete(&build_prompt(&self.cfg.topic)).await;
        spinner.finish_and_clear();

        let scripts = ScriptSet::parse(&raw?)?;
        logok(format!(
            "Scripts ready: long {} words, {} of 3 shorts",
            scripts.long.split_whitespace().count(),
            scripts.present_shorts()
        ));
        Ok(scripts)
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        init::ensure_directories(&self.cfg).await?;
        let removed = init::clear_stale_downloads(&self.cfg.stock_dir).await?;
        if removed > 0 {
            logi(format!("Removed {removed} interrupted stock downloads"));
        }

        let scripts = self.generate_content().await?;
        for (i, slot) in scripts.shorts.iter().enumerate() {
            if slot.text().is_none() {
                logw(format!("Short script {} missing from model response; skipping", i + 1));
            }
        }

        let mut videos = Vec::new();
        for (kind, text) in scripts.jobs() {
            let audio = self.cfg.audio_dir.join(kind.audio_file_name());
            logi(format!("Generating voice -> {}", audio.display()));
            let spinner = self.progress.spinner(format!("Voicing {kind} script..."));
            let voiced = self.tts.synthesize(text, &audio).await;
            spinner.finish_and_clear();
            voiced.with_context(|| format!("speech synthesis for {kind} script"))?;

            let video = self
                .assembler
                .assemble(text, &audio, &kind.output_file_name(), kind.format())
                .await
                .with_context(|| format!("render {kind} video"))?;
            videos.push(video);
        }

        Ok(RunReport {
            scripts,
            videos,
            output_dir: self.output_dir().to_path_buf(),
        })
    }
}

/// Full run from `config.json` + environment, as the binary performs it.
pub async fn run_generation() -> Result<RunReport> {
    let cfg = Config::load("config.json").await?;
    let mut pipeline = Pipeline::from_config(cfg)?;
    pipeline.run().await
}
