//! Step lifecycle events and the reporter contract.
//!
//! The engine narrates a run as a stream of [`StepEvent`]s. Anything that
//! renders progress implements [`Reporter`]; the engine never inspects what a
//! reporter does with an event.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Events emitted while a pipeline runs.
///
/// Per step the lifecycle is `StepPending → StepRunning → StepTitleUpdated* →
/// StepSucceeded | StepFailed`, or `StepPending → StepSkipped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// A phase passed its guard and is about to run its steps.
    PhaseStarted { phase: String, steps: usize },
    /// A phase guard skipped the whole phase.
    PhaseSkipped { phase: String, reason: String },
    /// Every step of a phase succeeded or was skipped.
    PhaseCompleted { phase: String },
    /// A step in this phase failed; the run stops here.
    PhaseFailed { phase: String, step: String },
    /// A step is queued in a started phase.
    StepPending { phase: String, index: usize, title: String },
    /// A step body is about to be invoked.
    StepRunning { phase: String, index: usize, title: String },
    /// A step body rewrote its own title while running.
    StepTitleUpdated { phase: String, index: usize, title: String },
    /// A step body returned normally. `title` is the final title.
    StepSucceeded {
        phase: String,
        index: usize,
        title: String,
        elapsed_ms: u64,
    },
    /// A step's skip predicate produced a reason; its body was not invoked.
    StepSkipped {
        phase: String,
        index: usize,
        title: String,
        reason: String,
    },
    /// A step body failed. `title` is the last title the step displayed.
    StepFailed {
        phase: String,
        index: usize,
        title: String,
        message: String,
        elapsed_ms: u64,
    },
    /// The run is over.
    RunCompleted { success: bool },
}

impl StepEvent {
    /// Name of the phase this event belongs to, if any.
    pub fn phase(&self) -> Option<&str> {
        match self {
            StepEvent::PhaseStarted { phase, .. }
            | StepEvent::PhaseSkipped { phase, .. }
            | StepEvent::PhaseCompleted { phase }
            | StepEvent::PhaseFailed { phase, .. }
            | StepEvent::StepPending { phase, .. }
            | StepEvent::StepRunning { phase, .. }
            | StepEvent::StepTitleUpdated { phase, .. }
            | StepEvent::StepSucceeded { phase, .. }
            | StepEvent::StepSkipped { phase, .. }
            | StepEvent::StepFailed { phase, .. } => Some(phase),
            StepEvent::RunCompleted { .. } => None,
        }
    }
}

/// Consumer of step lifecycle events.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &StepEvent);
}

/// Reporter that drops every event.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: &StepEvent) {}
}

/// Reporter that records every event in order. Used by tests and by callers
/// that want to inspect a run after the fact.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<StepEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &StepEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
