//! Timeline planning: sentences, segment timing and visual sources.

use crate::error::ScriptError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

pub const FPS: u32 = 30;
pub const ZOOM_HEADROOM: f64 = 1.2;
pub const ZOOM_RATE: f64 = 0.05;
pub const FALLBACK_COLOR: &str = "0x05050F";
pub const QUERY_CHARS: usize = 60;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Scales both sides, rounding down to even values for yuv420p.
    pub fn scaled(self, factor: f64) -> Canvas {
        let even = |v: u32| (((v as f64) * factor).round() as u32) & !1;
        Canvas {
            width: even(self.width),
            height: even(self.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Long,
    Short,
}

impl VideoFormat {
    pub fn canvas(self) -> Canvas {
        match self {
            Self::Long => Canvas {
                width: 1920,
                height: 1080,
            },
            Self::Short => Canvas {
                width: 1080,
                height: 1920,
            },
        }
    }

    pub fn duration_cap(self) -> f64 {
        match self {
            Self::Long => 900.0,
            Self::Short => 60.0,
        }
    }

    pub fn max_sentences(self) -> usize {
        match self {
            Self::Long => 30,
            Self::Short => 12,
        }
    }

    pub fn caption_font_size(self) -> u32 {
        match self {
            Self::Long => 100,
            Self::Short => 90,
        }
    }

    pub fn caption_margin(self) -> u32 {
        match self {
            Self::Long => 140,
            Self::Short => 100,
        }
    }
}

pub fn clamp_duration(audio_seconds: f64, format: VideoFormat) -> f64 {
    audio_seconds.clamp(0.0, format.duration_cap())
}

/// Splits on `.`, trims, re-appends the period and keeps at most `max`.
pub fn split_sentences(script: &str, max: usize) -> Vec<String> {
    script
        .replace('\n', " ")
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max)
        .map(|s| format!("{s}."))
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Query text for the stock search: whitespace collapsed, first 60 chars.
pub fn stock_query(sentence: &str) -> String {
    collapse_whitespace(sentence).chars().take(QUERY_CHARS).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub sentence: String,
    pub start: f64,
    pub duration: f64,
    /// Encoded frame count; cumulative boundaries are rounded so the sum
    /// matches `round(total * FPS)`.
    pub frames: u64,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub format: VideoFormat,
    pub total_duration: f64,
    pub segments: Vec<Segment>,
}

impl SegmentPlan {
    pub fn build(
        script: &str,
        audio_seconds: f64,
        format: VideoFormat,
    ) -> Result<Self, ScriptError> {
        let sentences = split_sentences(script, format.max_sentences());
        if sentences.is_empty() {
            return Err(ScriptError::NoSentences);
        }

        let total_duration = clamp_duration(audio_seconds, format);
        let count = sentences.len();
        let seg = total_duration / count as f64;
        let boundary = |i: usize| (i as f64 * seg * FPS as f64).round() as u64;

        let segments = sentences
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| Segment {
                index,
                sentence,
                start: index as f64 * seg,
                duration: seg,
                frames: (boundary(index + 1) - boundary(index)).max(1),
            })
            .collect();

        Ok(Self {
            format,
            total_duration,
            segments,
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.segments.iter().map(|s| s.frames).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualSource {
    Stock(PathBuf),
    Solid {
        canvas: Canvas,
        duration: f64,
        color: &'static str,
    },
}

impl VisualSource {
    pub fn fallback(canvas: Canvas, duration: f64) -> Self {
        Self::Solid {
            canvas,
            duration,
            color: FALLBACK_COLOR,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Solid { .. })
    }
}
