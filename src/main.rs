use anyhow::Result;
use faceless_factory::generator::{self, DONE_BANNER, START_BANNER};
use faceless_factory::init;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    if !init::check_ffmpeg().await {
        eprintln!("[WARNING] ffmpeg/ffprobe not found in PATH. Please install FFmpeg.");
    }

    println!("{START_BANNER}");
    let report = generator::run_generation().await?;
    for video in &report.videos {
        tracing::info!(
            path = %video.path.display(),
            seconds = video.duration,
            segments = video.segments,
            "rendered"
        );
    }
    println!("{DONE_BANNER}");
    tracing::info!(dir = %report.output_dir.display(), "videos written");
    Ok(())
}
