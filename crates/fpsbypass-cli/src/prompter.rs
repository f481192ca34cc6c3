//! CLI prompt for changing the target frame rate

use std::io::{self, Write};

use fpsbypass_core::{MAX_FPS, MIN_FPS};
use owo_colors::OwoColorize;

/// Writes the interactive FPS prompt
pub struct CliPrompter<W: Write> {
    out: W,
}

impl CliPrompter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> CliPrompter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Show the current target followed by the input marker.
    pub fn prompt(&mut self, target_fps: i32) {
        writeln!(self.out, "Target FPS: {}", target_fps.bold().green()).ok();
        write!(self.out, ">>> ").ok();
        self.out.flush().ok();
    }

    pub fn not_a_number(&mut self) {
        self.display_warning("Please enter a valid number as the target FPS.");
    }

    pub fn out_of_range(&mut self) {
        self.display_warning(&format!(
            "Invalid FPS value. Please enter a value between {} and {}.",
            MIN_FPS, MAX_FPS
        ));
    }

    pub fn display_message(&mut self, message: &str) {
        writeln!(self.out, "{}", message).ok();
    }

    pub fn display_warning(&mut self, message: &str) {
        writeln!(self.out, "{}", message.yellow()).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(f: impl FnOnce(&mut CliPrompter<&mut Vec<u8>>)) -> String {
        let mut buffer = Vec::new();
        f(&mut CliPrompter::new(&mut buffer));
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_prompt_shows_target() {
        let text = output(|p| p.prompt(144));
        assert!(text.starts_with("Target FPS: "));
        assert!(text.contains("144"));
        assert!(text.ends_with(">>> "));
    }

    #[test]
    fn test_out_of_range_names_bounds() {
        let text = output(|p| p.out_of_range());
        assert!(text.contains("between 1 and 1000"));
    }

    #[test]
    fn test_not_a_number() {
        let text = output(|p| p.not_a_number());
        assert!(text.contains("valid number"));
    }
}
