//! Colored terminal output.

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes user-facing lines to the terminal, honoring `--quiet` and `--verbose`.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    choice: ColorChoice,
}

impl OutputManager {
    /// Creates an output manager. `quiet` wins over `verbose`.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let choice = if std::env::var_os("NO_COLOR").is_some() {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Self {
            verbose: verbose && !quiet,
            quiet,
            choice,
        }
    }

    /// Whether verbose output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn write(
        &self,
        mut stream: StandardStream,
        color: Option<Color>,
        bold: bool,
        prefix: &str,
        message: &str,
    ) -> io::Result<()> {
        if !prefix.is_empty() {
            stream.set_color(ColorSpec::new().set_fg(color).set_bold(bold))?;
            write!(stream, "{prefix}")?;
            stream.reset()?;
            writeln!(stream, " {message}")
        } else {
            stream.set_color(ColorSpec::new().set_fg(color).set_bold(bold))?;
            writeln!(stream, "{message}")?;
            stream.reset()
        }
    }

    fn stdout(&self) -> StandardStream {
        StandardStream::stdout(self.choice)
    }

    fn stderr(&self) -> StandardStream {
        StandardStream::stderr(self.choice)
    }

    /// Detail shown only with `--verbose`.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.write(self.stdout(), Some(Color::Cyan), false, "  ·", message)
    }

    /// Plain informational line.
    pub fn info(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write(self.stdout(), None, false, "", message)
    }

    /// Warning, on stderr.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write(self.stderr(), Some(Color::Yellow), true, "⚠", message)
    }

    /// Error, on stderr; shown even when quiet.
    pub fn error(&self, message: &str) -> io::Result<()> {
        self.write(self.stderr(), Some(Color::Red), true, "✗", message)
    }

    /// Success line.
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write(self.stdout(), Some(Color::Green), true, "✓", message)
    }

    /// Progress line.
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write(self.stdout(), Some(Color::Blue), true, "→", message)
    }

    /// Section header.
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = self.stdout();
        writeln!(out)?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        writeln!(out, "{title}")?;
        writeln!(out, "{}", "=".repeat(title.chars().count()))?;
        out.reset()
    }

    /// Indented detail line.
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write(self.stdout(), None, false, "", &format!("    {message}"))
    }
}
