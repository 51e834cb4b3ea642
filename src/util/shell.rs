//! Terminal output for the twinpack CLI.
//!
//! Human mode prints right-aligned status lines and a spinner to stderr.
//! JSON mode prints nothing but build events, one per stdout line.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::str::FromStr;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::events::BuildEvent;
use crate::util::diagnostic::Diagnostic;

/// How build results are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(MessageFormat::Human),
            "json" => Ok(MessageFormat::Json),
            _ => Err(format!(
                "invalid message format '{}'; expected 'human' or 'json'",
                s
            )),
        }
    }
}

/// Status words for human output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Building,
    Detected,
    Finished,
    Removed,
    Warning,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Building => "Building",
            Status::Detected => "Detected",
            Status::Finished => "Finished",
            Status::Removed => "Removed",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Removed => "\x1b[1;32m",
            Status::Building | Status::Detected => "\x1b[1;36m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

const STATUS_WIDTH: usize = 12;

#[derive(Debug)]
pub struct Shell {
    format: MessageFormat,
    verbose: bool,
    use_color: bool,
}

impl Shell {
    /// Colors are used only when requested and stderr is a terminal.
    pub fn new(format: MessageFormat, verbose: bool, color: bool) -> Self {
        Shell {
            format,
            verbose,
            use_color: color && format == MessageFormat::Human && io::stderr().is_terminal(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == MessageFormat::Json
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print `{status:>12} {message}` to stderr. Ignored in JSON mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn warn(&self, msg: impl Display) {
        if self.is_json() {
            self.event(&BuildEvent::warning(msg.to_string()));
        } else {
            self.status(Status::Warning, msg);
        }
    }

    /// Report a diagnostic in the active format. Human output shows paths
    /// relative to the working directory.
    pub fn diagnostic(&self, diag: &Diagnostic) {
        if self.is_json() {
            self.event(&BuildEvent::error(diag));
        } else {
            let cwd = std::env::current_dir().ok();
            eprint!("{}", diag.render(self.use_color, cwd.as_deref()));
        }
    }

    /// Print a build event. Only JSON mode prints events.
    pub fn event(&self, event: &BuildEvent) {
        if self.is_json() {
            event.emit();
        }
    }

    /// A spinner shown while `msg` is in progress.
    ///
    /// Hidden in JSON and verbose modes and when stderr is not a terminal.
    pub fn spinner(&self, msg: impl Display) -> Spinner {
        let visible = !self.is_json() && !self.verbose && io::stderr().is_terminal();
        let pb = visible.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(msg.to_string());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        Spinner { pb }
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!("{}{:>STATUS_WIDTH$}\x1b[0m", status.color_code(), text)
        } else {
            format!("{:>STATUS_WIDTH$}", text)
        }
    }
}

/// A progress spinner, cleared on drop.
pub struct Spinner {
    pb: Option<ProgressBar>,
}

impl Spinner {
    pub fn set_message(&self, msg: impl Display) {
        if let Some(pb) = &self.pb {
            pb.set_message(msg.to_string());
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
