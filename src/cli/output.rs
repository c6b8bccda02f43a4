//! Colored terminal output for pipeline progress.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes user-facing progress to the terminal.
///
/// Diagnostics go through `log`; this is only for the human watching the CI
/// job, so write failures are ignored.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates a new output manager.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Print message only in verbose mode
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.write(false, None, false, message);
        }
    }

    /// Print a progress line
    pub fn progress(&self, message: &str) {
        if !self.quiet {
            self.write(false, Some(Color::Cyan), false, &format!("→ {}", message));
        }
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.write(false, Some(Color::Green), false, &format!("✓ {}", message));
        }
    }

    /// Print a warning line to stderr
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.write(true, Some(Color::Yellow), false, &format!("⚠ {}", message));
        }
    }

    /// Print an error line to stderr, even in quiet mode
    pub fn error(&self, message: &str) {
        self.write(true, Some(Color::Red), true, &format!("✗ {}", message));
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if !self.quiet {
            self.write(false, Some(Color::Blue), true, &format!("\n== {} ==", title));
        }
    }

    /// Print indented text, used for streamed subprocess output
    pub fn indent(&self, message: &str) {
        if !self.quiet {
            self.write(false, None, false, &format!("   {}", message));
        }
    }

    fn write(&self, stderr: bool, color: Option<Color>, bold: bool, message: &str) {
        let mut stream = if stderr {
            StandardStream::stderr(ColorChoice::Auto)
        } else {
            StandardStream::stdout(ColorChoice::Auto)
        };
        let _ = stream.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = writeln!(stream, "{}", message);
        let _ = stream.reset();
    }
}
