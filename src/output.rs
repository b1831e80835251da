//! Colored output sink for run reports.
//!
//! Every report line is written through a [`Line`] token acquired from
//! [`Output`]. The token borrows the sink for as long as the line is being
//! built and terminates the line, resets colors and flushes when dropped, so
//! an early return in the middle of a report cannot leave the terminal in a
//! colored state or interleave two lines.

use crate::error::ConfigError;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::rc::Rc;
use std::str::FromStr;
use termcolor::{Color, ColorChoice, ColorSpec, NoColor, StandardStream, WriteColor};

/// Whether report lines are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorPolicy {
    On,
    Off,
    /// Color only when both stdout and stderr are terminals.
    #[default]
    Auto,
}

impl FromStr for ColorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(ColorPolicy::On),
            "off" => Ok(ColorPolicy::Off),
            "auto" => Ok(ColorPolicy::Auto),
            _ => Err(ConfigError::InvalidColor(s.to_string())),
        }
    }
}

impl ColorPolicy {
    fn choice(self) -> ColorChoice {
        match self {
            ColorPolicy::On => ColorChoice::Always,
            ColorPolicy::Off => ColorChoice::Never,
            ColorPolicy::Auto => {
                if io::stdout().is_terminal() && io::stderr().is_terminal() {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
        }
    }
}

/// Which of the two report streams a line goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Progress and passing results.
    Log,
    /// Failures.
    Error,
}

/// The pair of streams a run reports to.
pub struct Output {
    log: Box<dyn WriteColor>,
    error: Box<dyn WriteColor>,
    stdio: bool,
}

impl Output {
    /// Report to stdout and stderr.
    pub fn stdio(policy: ColorPolicy) -> Self {
        let choice = policy.choice();
        Self {
            log: Box::new(StandardStream::stdout(choice)),
            error: Box::new(StandardStream::stderr(choice)),
            stdio: true,
        }
    }

    pub fn new(log: impl WriteColor + 'static, error: impl WriteColor + 'static) -> Self {
        Self {
            log: Box::new(log),
            error: Box::new(error),
            stdio: false,
        }
    }

    /// Whether this reports to the process's stdout and stderr.
    pub fn is_stdio(&self) -> bool {
        self.stdio
    }

    /// Both streams, uncolored, into one shared buffer.
    pub fn captured() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let output = Self::new(NoColor::new(buffer.clone()), NoColor::new(buffer.clone()));
        (output, buffer)
    }

    /// Start a line on the given stream.
    pub fn line(&mut self, stream: Stream) -> Line<'_> {
        let out = match stream {
            Stream::Log => &mut self.log,
            Stream::Error => &mut self.error,
        };
        Line { out, space: false }
    }

    pub fn log(&mut self) -> Line<'_> {
        self.line(Stream::Log)
    }

    pub fn error(&mut self) -> Line<'_> {
        self.line(Stream::Error)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdio(ColorPolicy::Auto)
    }
}

/// One report line being written.
///
/// Values are separated by single spaces unless [`nospace`](Line::nospace)
/// is called before the next value.
pub struct Line<'a> {
    out: &'a mut Box<dyn WriteColor>,
    space: bool,
}

impl Line<'_> {
    pub fn write(&mut self, value: impl fmt::Display) -> &mut Self {
        if self.space {
            let _ = self.out.write_all(b" ");
        }
        let _ = write!(self.out, "{}", value);
        self.space = true;
        self
    }

    /// Glue the next value to the previous one.
    pub fn nospace(&mut self) -> &mut Self {
        self.space = false;
        self
    }

    /// Switch color. `None` keeps the terminal's default foreground.
    pub fn color(&mut self, color: Option<Color>, bold: bool) -> &mut Self {
        let _ = self
            .out
            .set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        self
    }

    pub fn bold(&mut self) -> &mut Self {
        self.color(None, true)
    }

    pub fn reset(&mut self) -> &mut Self {
        let _ = self.out.reset();
        self
    }

    /// Continue on a new physical line within the same report.
    pub fn newline(&mut self) -> &mut Self {
        let _ = self.out.reset();
        let _ = self.out.write_all(b"\n");
        self.space = false;
        self
    }
}

impl Drop for Line<'_> {
    fn drop(&mut self) {
        let _ = self.out.reset();
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

/// In-memory stream that can be cloned and read back, for capturing reports.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_separate_values_with_spaces() {
        let (mut output, buffer) = Output::captured();
        output.log().write("Starting").write("suite").write(3);
        assert_eq!(buffer.contents(), "Starting suite 3\n");
    }

    #[test]
    fn should_glue_values_after_nospace() {
        let (mut output, buffer) = Output::captured();
        output
            .error()
            .write("[")
            .nospace()
            .write("07")
            .nospace()
            .write("]")
            .write("name");
        assert_eq!(buffer.contents(), "[07] name\n");
    }

    #[test]
    fn should_terminate_line_when_token_dropped_early() {
        fn report(output: &mut Output, bail: bool) -> Option<()> {
            let mut line = output.log();
            line.color(Some(Color::Red), true).write("partial");
            if bail {
                return None;
            }
            line.write("rest");
            Some(())
        }

        let (mut output, buffer) = Output::captured();
        assert!(report(&mut output, true).is_none());
        output.log().write("next");
        assert_eq!(buffer.contents(), "partial\nnext\n");
    }

    #[test]
    fn should_parse_color_policy_case_insensitively() {
        assert_eq!("ON".parse::<ColorPolicy>().unwrap(), ColorPolicy::On);
        assert_eq!("off".parse::<ColorPolicy>().unwrap(), ColorPolicy::Off);
        assert!("sometimes".parse::<ColorPolicy>().is_err());
    }
}
