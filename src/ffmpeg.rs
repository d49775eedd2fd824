use crate::logw;
use crate::plan::{Canvas, FPS, VisualSource, ZOOM_HEADROOM, ZOOM_RATE};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

const STDERR_TAIL_CHARS: usize = 1200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub preset: String,
    pub threads: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            threads: 8,
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars().skip(skip).collect()
}

fn ffmpeg_base() -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

async fn run_cmd(mut cmd: Command, what: &str) -> Result<()> {
    let output = cmd
        .output()
        .await
        .with_context(|| format!("{what}: command execution failed"))?;
    if !output.status.success() {
        anyhow::bail!("{what} failed ({}): {}", output.status, stderr_tail(&output.stderr));
    }
    Ok(())
}

pub async fn ffprobe_video_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed: {}", stderr_tail(&output.stderr));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut parts = text.split('x');
    let w = parts.next().and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
    let h = parts.next().and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);

    if w == 0 || h == 0 {
        anyhow::bail!("Invalid dimensions from ffprobe: {text:?}");
    }

    Ok((w, h))
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed: {}", stderr_tail(&output.stderr));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        anyhow::bail!("Invalid duration for {}: {text:?}", path.display());
    }
    Ok(duration)
}

/// Cover-scale to 1.2x the canvas, zoom in linearly over `frames`, then
/// center-crop to the canvas at a fixed 30 fps.
pub fn visual_filter(canvas: Canvas, frames: u64) -> String {
    let big = canvas.scaled(ZOOM_HEADROOM);
    format!(
        "fps={FPS},\
         scale={bw}:{bh}:force_original_aspect_ratio=increase,\
         crop={bw}:{bh},\
         zoompan=z='{ZOOM_HEADROOM}*(1+{ZOOM_RATE}*on/{frames})':\
         x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={FPS},\
         setsar=1,format=yuv420p",
        bw = big.width,
        bh = big.height,
        w = canvas.width,
        h = canvas.height,
        frames = frames.max(1),
    )
}

fn push_encode_args(cmd: &mut Command, opts: &EncodeOptions) {
    cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset"])
        .arg(&opts.preset)
        .arg("-threads")
        .arg(opts.threads.to_string())
        .arg("-r")
        .arg(FPS.to_string());
}

/// Renders one silent segment of exactly `frames` frames.
pub async fn ffmpeg_render_segment(
    visual: &VisualSource,
    canvas: Canvas,
    frames: u64,
    opts: &EncodeOptions,
    out_mp4: &Path,
) -> Result<()> {
    let mut cmd = ffmpeg_base();
    match visual {
        VisualSource::Stock(clip) => {
            cmd.args(["-stream_loop", "-1", "-i"]).arg(clip);
        }
        VisualSource::Solid { canvas, color, .. } => {
            cmd.args(["-f", "lavfi", "-i"]).arg(format!(
                "color=c={color}:s={}x{}:r={FPS}",
                canvas.width, canvas.height
            ));
        }
    }

    cmd.arg("-filter_complex")
        .arg(format!("[0:v]{}[v]", visual_filter(canvas, frames)))
        .args(["-map", "[v]", "-an", "-frames:v"])
        .arg(frames.to_string());
    push_encode_args(&mut cmd, opts);
    cmd.arg(out_mp4);

    run_cmd(cmd, "segment render").await?;
    if !out_mp4.exists() {
        anyhow::bail!("segment render produced no file: {}", out_mp4.display());
    }
    Ok(())
}

pub fn concat_list_contents(segments: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in segments {
        let escaped = path.display().to_string().replace('\'', "'\\''");
        out.push_str(&format!("file '{escaped}'\n"));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub index: u64,
    pub total: u64,
}

impl ProgressEvent {
    pub fn percent(&self) -> f64 {
        percent(self.index, self.total)
    }
}

pub fn percent(index: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (index as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Maps one `-progress` line to an event; `total_us` is the target length.
pub fn parse_progress_line(line: &str, total_us: u64) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<u64>().ok().map(|index| ProgressEvent {
            index,
            total: total_us,
        }),
        "progress" if value == "end" => Some(ProgressEvent {
            index: total_us,
            total: total_us,
        }),
        _ => None,
    }
}

pub struct ComposeJob<'a> {
    /// Working directory; caption text files are resolved relative to it.
    pub work_dir: &'a Path,
    pub concat_list: &'a Path,
    pub narration: &'a Path,
    pub caption_filters: &'a str,
    pub duration: f64,
    pub out_mp4: &'a Path,
}

/// Concatenates segments, burns captions, attaches narration and encodes.
pub async fn ffmpeg_compose_final<F>(
    job: &ComposeJob<'_>,
    opts: &EncodeOptions,
    mut on_progress: F,
) -> Result<()>
where
    F: FnMut(ProgressEvent),
{
    let concat_list = std::path::absolute(job.concat_list)
        .with_context(|| format!("resolve {}", job.concat_list.display()))?;
    let narration = std::path::absolute(job.narration)
        .with_context(|| format!("resolve {}", job.narration.display()))?;
    let out_mp4 = std::path::absolute(job.out_mp4)
        .with_context(|| format!("resolve {}", job.out_mp4.display()))?;

    let filter = if job.caption_filters.is_empty() {
        "[0:v]null[v]".to_string()
    } else {
        format!("[0:v]{}[v]", job.caption_filters)
    };

    let mut cmd = ffmpeg_base();
    cmd.current_dir(job.work_dir)
        .args(["-nostats", "-progress", "pipe:1"])
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(&concat_list)
        .arg("-i")
        .arg(&narration)
        .arg("-filter_complex")
        .arg(filter)
        .args(["-map", "[v]", "-map", "1:a:0", "-t"])
        .arg(format!("{:.3}", job.duration));
    push_encode_args(&mut cmd, opts);
    cmd.args(["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"])
        .arg(&out_mp4)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("failed to spawn ffmpeg")?;
    let stdout = child.stdout.take().context("ffmpeg stdout unavailable")?;
    let mut stderr = child.stderr.take().context("ffmpeg stderr unavailable")?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        buf
    });

    let total_us = (job.duration * 1_000_000.0) as u64;
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(event) = parse_progress_line(&line, total_us) {
            on_progress(event);
        }
    }

    let status = child.wait().await.context("ffmpeg wait failed")?;
    let stderr = stderr_task.await.unwrap_or_default();
    if !status.success() {
        anyhow::bail!("final render failed ({status}): {}", stderr_tail(&stderr));
    }
    if !stderr.is_empty() {
        logw(format!("ffmpeg: {}", stderr_tail(&stderr)));
    }
    if !out_mp4.exists() {
        anyhow::bail!("final render produced no file: {}", out_mp4.display());
    }
    Ok(())
}
