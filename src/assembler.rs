//! Composes one finished video from a script and its narration.

use crate::api::StockSource;
use crate::caption::{CaptionFont, CaptionStyle, captions_for, drawtext_chain};
use crate::config::Config;
use crate::ffmpeg::{self, ComposeJob, EncodeOptions};
use crate::plan::{Canvas, Segment, SegmentPlan, VideoFormat, VisualSource, stock_query};
use crate::progress::Progress;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub format: VideoFormat,
    pub duration: f64,
    pub segments: usize,
    pub fallback_segments: usize,
}

pub struct VideoAssembler {
    stock: Arc<dyn StockSource>,
    output_dir: PathBuf,
    encode: EncodeOptions,
    font: CaptionFont,
    progress: Progress,
    rng: StdRng,
}

impl VideoAssembler {
    pub fn new(cfg: &Config, stock: Arc<dyn StockSource>) -> Self {
        let font = match &cfg.caption_font_file {
            Some(path) => CaptionFont::File(path.clone()),
            None => CaptionFont::Family(cfg.caption_font.clone()),
        };
        Self {
            stock,
            output_dir: cfg.output_dir.clone(),
            encode: EncodeOptions {
                preset: cfg.encoder_preset.clone(),
                threads: cfg.encoder_threads,
            },
            font,
            progress: Progress::new(cfg.progress),
            rng: StdRng::seed_from_u64(now_seed()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Stock clip for the segment, or the solid fallback on any failure.
    async fn choose_visual(&mut self, segment: &Segment, canvas: Canvas) -> VisualSource {
        let query = stock_query(&segment.sentence);
        match self.stock.fetch(&query).await {
            Ok(paths) => {
                let mut existing = Vec::with_capacity(paths.len());
                for path in paths {
                    if fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                        existing.push(path);
                    }
                }
                match existing.choose(&mut self.rng) {
                    Some(path) => VisualSource::Stock(path.clone()),
                    None => {
                        logw(format!(
                            "No stock clips for segment {} ({:?}); using fallback",
                            segment.index + 1,
                            query
                        ));
                        VisualSource::fallback(canvas, segment.duration)
                    }
                }
            }
            Err(err) => {
                logw(format!(
                    "Stock fetch failed for segment {} [{}]: {}; using fallback",
                    segment.index + 1,
                    err.kind(),
                    err
                ));
                VisualSource::fallback(canvas, segment.duration)
            }
        }
    }

    async fn render_segment(
        &mut self,
        segment: &Segment,
        canvas: Canvas,
        out: &Path,
    ) -> Result<VisualSource> {
        let visual = self.choose_visual(segment, canvas).await;
        match ffmpeg::ffmpeg_render_segment(&visual, canvas, segment.frames, &self.encode, out)
            .await
        {
            Ok(()) => Ok(visual),
            Err(err) if !visual.is_fallback() => {
                logw(format!(
                    "Stock clip unusable for segment {}: {err:#}; using fallback",
                    segment.index + 1
                ));
                let fallback = VisualSource::fallback(canvas, segment.duration);
                ffmpeg::ffmpeg_render_segment(&fallback, canvas, segment.frames, &self.encode, out)
                    .await
                    .with_context(|| format!("fallback segment {} render", segment.index + 1))?;
                Ok(fallback)
            }
            Err(err) => Err(err.context(format!("segment {} render", segment.index + 1))),
        }
    }

    pub async fn assemble(
        &mut self,
        script: &str,
        narration: &Path,
        output_name: &str,
        format: VideoFormat,
    ) -> Result<RenderedVideo> {
        let audio_seconds = ffmpeg::ffprobe_duration_seconds(narration)
            .await
            .with_context(|| format!("ffprobe narration {}", narration.display()))?;
        let plan = SegmentPlan::build(script, audio_seconds, format)?;
        let canvas = format.canvas();
        logi(format!(
            "Building {} clips for {} ({:.2}s of {:.2}s narration)",
            plan.segments.len(),
            output_name,
            plan.total_duration,
            audio_seconds
        ));

        let scratch = tempfile::Builder::new()
            .prefix("faceless_render_")
            .tempdir()
            .context("create render scratch dir")?;
        let work_dir = std::path::absolute(scratch.path()).context("resolve scratch dir")?;

        let mut segment_files = Vec::with_capacity(plan.segments.len());
        let mut fallback_segments = 0;
        for segment in &plan.segments {
            let out = work_dir.join(format!("segment_{:03}.mp4", segment.index));
            let visual = self.render_segment(segment, canvas, &out).await?;
            if visual.is_fallback() {
                fallback_segments += 1;
            }
            segment_files.push(out);
        }

        let style = CaptionStyle::for_format(format, self.font.clone());
        let captions = captions_for(&plan, &style);
        for caption in &captions {
            fs::write(work_dir.join(caption.text_file_name()), &caption.text)
                .await
                .with_context(|| format!("write caption {}", caption.index))?;
        }
        let caption_filters = drawtext_chain(&captions, &style);

        let concat_list = work_dir.join("segments.txt");
        fs::write(&concat_list, ffmpeg::concat_list_contents(&segment_files))
            .await
            .context("write concat list")?;

        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("create {}", self.output_dir.display()))?;
        let out_path = self.output_dir.join(output_name);

        let job = ComposeJob {
            work_dir: &work_dir,
            concat_list: &concat_list,
            narration,
            caption_filters: &caption_filters,
            duration: plan.total_duration,
            out_mp4: &out_path,
        };
        let pb = self.progress.render(output_name);
        let rendered = ffmpeg::ffmpeg_compose_final(&job, &self.encode, |event| {
            pb.set_position(event.percent().round() as u64);
        })
        .await;
        pb.finish_and_clear();
        rendered?;

        if let Err(err) = scratch.close() {
            logw(format!("Failed to remove render scratch dir: {err}"));
        }

        logok(format!(
            "{} DONE ({} segments, {} fallback)",
            output_name,
            plan.segments.len(),
            fallback_segments
        ));
        Ok(RenderedVideo {
            path: out_path,
            format,
            duration: plan.total_duration,
            segments: plan.segments.len(),
            fallback_segments,
        })
    }
}
