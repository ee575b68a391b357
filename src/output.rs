// ABOUTME: Output formatting for CLI feedback and plan reports.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::report::{Entry, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

/// Selects the output mode for plan programs.
pub const OUTPUT_VAR: &str = "HADRON_OUTPUT";

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (failures and the final status only)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" | "" => Some(OutputMode::Normal),
            "quiet" => Some(OutputMode::Quiet),
            "json" => Some(OutputMode::Json),
            _ => None,
        }
    }

    /// Mode named by `HADRON_OUTPUT`; unknown values fall back to normal.
    pub fn from_env() -> Self {
        std::env::var(OUTPUT_VAR)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Normal => "normal",
            OutputMode::Quiet => "quiet",
            OutputMode::Json => "json",
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn from_env() -> Self {
        Self::new(OutputMode::from_env())
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.duration() {
                Some(elapsed) => println!("{message} ({:.1}s)", elapsed),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event(&mut io::stdout(), "success", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.event(&mut io::stderr(), "error", message),
        }
    }

    fn event(&self, out: &mut dyn Write, event: &str, message: &str) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            let _ = writeln!(out, "{json}");
        }
    }

    /// Print a finished plan report to stdout.
    pub fn report(&self, report: &Report) {
        let _ = self.write_report(&mut io::stdout().lock(), report);
    }

    pub fn write_report(&self, out: &mut dyn Write, report: &Report) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => {
                let json = serde_json::to_string(report).map_err(io::Error::other)?;
                writeln!(out, "{json}")
            }
            OutputMode::Normal => {
                writeln!(out, "Plan {} ({}) on {}", report.plan, report.mode, report.hostname)?;
                for entry in report.entries() {
                    writeln!(out, "  {}", line(entry))?;
                }
                writeln!(out, "{}", report.status())
            }
            OutputMode::Quiet => {
                for entry in report.failures() {
                    writeln!(out, "{}", line(entry))?;
                }
                writeln!(out, "{}", report.status())
            }
        }
    }
}

fn line(entry: &Entry) -> String {
    let mut line = match &entry.host {
        Some(host) => format!("{} {} on {}: {}", entry.kind, entry.name, host, entry.outcome),
        None => format!("{} {}: {}", entry.kind, entry.name, entry.outcome),
    };
    if let Some(health) = entry.health {
        line.push_str(&format!(" (health: {})", health));
    }
    line
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
