//! Burned-in captions: one drop-shadowed, stroked text block per segment.

use crate::plan::{SegmentPlan, VideoFormat};
use std::path::PathBuf;

pub const MAX_CAPTION_CHARS: usize = 120;
pub const SHADOW_OFFSET: u32 = 8;
pub const STROKE_WIDTH: u32 = 8;
pub const SHADOW_COLOR: &str = "black@0.53";

const SIDE_PADDING: u32 = 60;
/// Average glyph advance of a condensed display face, relative to font size.
const GLYPH_WIDTH_RATIO: f64 = 0.55;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptionFont {
    Family(String),
    File(PathBuf),
}

impl CaptionFont {
    fn drawtext_option(&self) -> String {
        match self {
            Self::Family(name) => format!("font='{}'", quote_value(name)),
            Self::File(path) => format!("fontfile='{}'", quote_value(&path.display().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font: CaptionFont,
    pub font_size: u32,
    pub margin: u32,
}

impl CaptionStyle {
    pub fn for_format(format: VideoFormat, font: CaptionFont) -> Self {
        Self {
            font,
            font_size: format.caption_font_size(),
            margin: format.caption_margin(),
        }
    }

    pub fn chars_per_line(&self, canvas_width: u32) -> usize {
        let usable = canvas_width.saturating_sub(2 * SIDE_PADDING) as f64;
        ((usable / (self.font_size as f64 * GLYPH_WIDTH_RATIO)) as usize).max(8)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub index: usize,
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl Caption {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn text_file_name(&self) -> String {
        format!("caption_{:03}.txt", self.index)
    }
}

/// Uppercases, truncates to 120 characters and greedily wraps on words.
pub fn caption_text(sentence: &str, chars_per_line: usize) -> String {
    let upper: String = sentence
        .to_uppercase()
        .chars()
        .take(MAX_CAPTION_CHARS)
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in upper.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > chars_per_line && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

pub fn captions_for(plan: &SegmentPlan, style: &CaptionStyle) -> Vec<Caption> {
    let per_line = style.chars_per_line(plan.format.canvas().width);
    plan.segments
        .iter()
        .map(|seg| Caption {
            index: seg.index,
            text: caption_text(&seg.sentence, per_line),
            start: seg.start,
            duration: seg.duration,
        })
        .collect()
}

/// Two `drawtext` filters per caption (shadow, then main), comma-joined.
///
/// Caption text is read from `caption.text_file_name()` relative to the
/// ffmpeg working directory, so no text escaping is needed.
pub fn drawtext_chain(captions: &[Caption], style: &CaptionStyle) -> String {
    let font = style.font.drawtext_option();
    let mut filters = Vec::with_capacity(captions.len() * 2);
    for caption in captions {
        let enable = format!(
            "enable='gte(t,{:.6})*lt(t,{:.6})'",
            caption.start,
            caption.end()
        );
        let common = format!(
            "drawtext=textfile={}:expansion=none:{}:fontsize={}",
            caption.text_file_name(),
            font,
            style.font_size
        );
        filters.push(format!(
            "{common}:fontcolor={SHADOW_COLOR}:x=(w-text_w)/2+{off}:y=h-text_h-{margin}+{off}:{enable}",
            off = SHADOW_OFFSET,
            margin = style.margin,
        ));
        filters.push(format!(
            "{common}:fontcolor=white:borderw={STROKE_WIDTH}:bordercolor=black:x=(w-text_w)/2:y=h-text_h-{margin}:{enable}",
            margin = style.margin,
        ));
    }
    filters.join(",")
}

fn quote_value(value: &str) -> String {
    value.replace('\'', "'\\''")
}
