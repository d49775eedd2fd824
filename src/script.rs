//! Script set produced from one language-model response.

use crate::error::ScriptError;
use crate::plan::VideoFormat;
use std::fmt;

pub const LONG_MARKER: &str = "LONG_SCRIPT:";
pub const SHORT_MARKER: &str = "SHORT_";
pub const SHORT_COUNT: usize = 3;

const FALLBACK_CHARS: usize = 4000;
const SHORT_PREFIX_CHARS: &[char] = &['1', '2', '3', ':', '.', ' '];

pub fn build_prompt(topic: &str) -> String {
    format!(
        "Write viral faceless YouTube content about: {topic}\n\
         \n\
         Output exactly:\n\
         \n\
         {LONG_MARKER}\n\
         [1200-1600 word calm mysterious script]\n\
         \n\
         {SHORT_MARKER}1:\n\
         [50-90 sec hook]\n\
         \n\
         {SHORT_MARKER}2:\n\
         [50-90 sec hook]\n\
         \n\
         {SHORT_MARKER}3:\n\
         [50-90 sec hook]\n"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSlot {
    Present(String),
    Missing,
}

impl ScriptSlot {
    fn from_text(text: String) -> Self {
        if text.is_empty() {
            Self::Missing
        } else {
            Self::Present(text)
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Present(text) => Some(text),
            Self::Missing => None,
        }
    }
}

/// Identity of one script in a run; fixes its file names and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Long,
    Short(usize),
}

impl ScriptKind {
    pub fn format(self) -> VideoFormat {
        match self {
            Self::Long => VideoFormat::Long,
            Self::Short(_) => VideoFormat::Short,
        }
    }

    pub fn audio_file_name(self) -> String {
        match self {
            Self::Long => "long_audio.mp3".to_string(),
            Self::Short(n) => format!("short_{n}_audio.mp3"),
        }
    }

    pub fn output_file_name(self) -> String {
        match self {
            Self::Long => "LONG_TODAY.mp4".to_string(),
            Self::Short(n) => format!("SHORT_{n}_TODAY.mp4"),
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short(n) => write!(f, "short {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSet {
    pub long: String,
    pub shorts: [ScriptSlot; SHORT_COUNT],
}

impl ScriptSet {
    /// Splits a raw model response on the section markers.
    ///
    /// Falls back to the first 4000 characters of the response when the
    /// long-script section is absent or empty.
    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScriptError::EmptyResponse);
        }

        let parts: Vec<&str> = raw.split(SHORT_MARKER).collect();
        let long = parts[0]
            .split_once(LONG_MARKER)
            .map(|(_, body)| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| raw.chars().take(FALLBACK_CHARS).collect());

        let shorts = std::array::from_fn(|i| {
            let text = parts
                .get(i + 1)
                .map(|p| p.trim().trim_start_matches(SHORT_PREFIX_CHARS).trim())
                .unwrap_or_default();
            ScriptSlot::from_text(text.to_string())
        });

        Ok(Self { long, shorts })
    }

    pub fn present_shorts(&self) -> usize {
        self.shorts.iter().filter(|s| s.text().is_some()).count()
    }

    /// Scripts in render order: long first, then every present short.
    pub fn jobs(&self) -> Vec<(ScriptKind, &str)> {
        let mut jobs = vec![(ScriptKind::Long, self.long.as_str())];
        for (i, slot) in self.shorts.iter().enumerate() {
            if let Some(text) = slot.text() {
                jobs.push((ScriptKind::Short(i + 1), text));
            }
        }
        jobs
    }
}
