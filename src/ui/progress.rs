//! Terminal rendering of pipeline events.
//!
//! Three output modes:
//! - `full`: one spinner line per step, settled with a mark when it ends
//! - `minimal`: one plain line per finished step
//! - `json`: one JSON object per event for machine consumption

use crate::pipeline::{Reporter, StepEvent};
use crate::ui::icons::{CHECK, CROSS, PENDING, POINTER, SKIPPED, SPARKLE};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Output mode for [`ChecksUI`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Spinners and colours
    #[default]
    Full,
    /// Plain lines, suitable for CI logs
    Minimal,
    /// JSON-formatted events
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// [`Reporter`] that renders step progress to the terminal.
pub struct ChecksUI {
    mode: UiMode,
    multi: MultiProgress,
    /// Step lines of the running phase, keyed by `(phase, index)`
    bars: Mutex<HashMap<(String, usize), ProgressBar>>,
    term: Term,
}

impl ChecksUI {
    pub fn new(mode: UiMode) -> Self {
        Self {
            mode,
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            term: Term::stdout(),
        }
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn write_line(&self, line: &str) {
        let _ = writeln!(&self.term, "{line}");
    }

    fn with_bar(&self, phase: &str, index: usize, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(&(phase.to_string(), index))
        {
            f(bar);
        }
    }

    fn handle_json(&self, event: &StepEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            self.write_line(&json);
        }
    }

    fn handle_minimal(&self, event: &StepEvent) {
        if let Some(line) = minimal_line(event) {
            self.write_line(&line);
        }
    }

    fn handle_full(&self, event: &StepEvent) {
        match event {
            StepEvent::PhaseStarted { phase, .. } => {
                self.print_line(format!("{}", style(phase).bold()));
            }
            StepEvent::PhaseSkipped { phase, reason } => {
                self.print_line(format!(
                    "{}{} {}",
                    SKIPPED,
                    style(phase).bold(),
                    style(format!("[skipped: {reason}]")).dim()
                ));
            }
            StepEvent::StepPending {
                phase,
                index,
                title,
            } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(settled_style());
                bar.set_message(format!("{}{}", PENDING, style(title).dim()));
                if let Ok(mut bars) = self.bars.lock() {
                    bars.insert((phase.clone(), *index), bar);
                }
            }
            StepEvent::StepRunning {
                phase,
                index,
                title,
            } => self.with_bar(phase, *index, |bar| {
                bar.set_style(running_style());
                bar.set_message(title.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
            }),
            StepEvent::StepTitleUpdated {
                phase,
                index,
                title,
            } => self.with_bar(phase, *index, |bar| bar.set_message(title.clone())),
            StepEvent::StepSucceeded {
                phase,
                index,
                title,
                elapsed_ms,
            } => self.with_bar(phase, *index, |bar| {
                bar.set_style(settled_style());
                bar.finish_with_message(format!(
                    "{}{} {}",
                    CHECK,
                    title,
                    style(format_duration(Duration::from_millis(*elapsed_ms))).dim()
                ));
            }),
            StepEvent::StepSkipped {
                phase,
                index,
                title,
                reason,
            } => self.with_bar(phase, *index, |bar| {
                bar.set_style(settled_style());
                bar.finish_with_message(format!(
                    "{}{} {}",
                    SKIPPED,
                    style(title).dim(),
                    style(format!("[skipped: {reason}]")).dim()
                ));
            }),
            StepEvent::StepFailed {
                phase,
                index,
                title,
                message,
                ..
            } => self.with_bar(phase, *index, |bar| {
                bar.set_style(settled_style());
                bar.finish_with_message(format!(
                    "{}{}\n    {}{}",
                    CROSS,
                    style(title).red(),
                    POINTER,
                    style(message).red()
                ));
            }),
            StepEvent::PhaseCompleted { phase } | StepEvent::PhaseFailed { phase, .. } => {
                if let Ok(mut bars) = self.bars.lock() {
                    bars.retain(|(owner, _), bar| {
                        if owner == phase {
                            bar.abandon();
                            false
                        } else {
                            true
                        }
                    });
                }
            }
            StepEvent::RunCompleted { success } => {
                if *success {
                    self.print_line(format!(
                        "{}{}",
                        SPARKLE,
                        style("All release checks passed").green().bold()
                    ));
                }
            }
        }
    }
}

impl Reporter for ChecksUI {
    fn report(&self, event: &StepEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }
}

fn running_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("  {spinner:.cyan} {msg}")
        .expect("progress bar template is a valid static string")
}

fn settled_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("  {msg}")
        .expect("progress bar template is a valid static string")
}

/// Line printed for `event` in minimal mode, if any.
fn minimal_line(event: &StepEvent) -> Option<String> {
    match event {
        StepEvent::PhaseStarted { phase, .. } => Some(format!("{phase}:")),
        StepEvent::PhaseSkipped { phase, reason } => {
            Some(format!("- {phase} [skipped: {reason}]"))
        }
        StepEvent::StepSucceeded { title, .. } => Some(format!("  ✓ {title}")),
        StepEvent::StepSkipped { title, reason, .. } => {
            Some(format!("  - {title} [skipped: {reason}]"))
        }
        StepEvent::StepFailed { title, message, .. } => {
            Some(format!("  ✗ {title}: {message}"))
        }
        StepEvent::RunCompleted { success } => {
            Some(if *success { "Done: ✓" } else { "Done: ✗" }.to_string())
        }
        _ => None,
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}
