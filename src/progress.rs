//! Console progress indicators. Purely cosmetic; hidden bars when disabled.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn styled(&self, bar: ProgressBar, template: &str) -> ProgressBar {
        if !self.enabled {
            bar.set_draw_target(ProgressDrawTarget::hidden());
            return bar;
        }
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.with_style(style)
    }

    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        let pb = self.styled(ProgressBar::new_spinner(), "{spinner:.green} {msg} [{elapsed}]");
        pb.set_message(message.into());
        if self.enabled {
            pb.enable_steady_tick(Duration::from_millis(120));
        }
        pb
    }

    pub fn download(&self, message: impl Into<String>, total_bytes: Option<u64>) -> ProgressBar {
        let pb = match total_bytes {
            Some(len) => self.styled(
                ProgressBar::new(len),
                "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
            ),
            None => self.styled(
                ProgressBar::new_spinner(),
                "{spinner:.green} {msg} {bytes} {bytes_per_sec}",
            ),
        };
        pb.set_message(message.into());
        pb
    }

    /// A 0-100 bar fed with encoder percentages.
    pub fn render(&self, name: impl Into<String>) -> ProgressBar {
        let pb = self.styled(
            ProgressBar::new(100),
            "Rendering {msg} [{bar:40.green/white}] {pos:>3}% ({eta})",
        );
        pb.set_message(name.into());
        pb
    }
}
