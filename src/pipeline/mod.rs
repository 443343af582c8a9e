//! Ordered validation pipeline.
//!
//! A pipeline is a list of [`Phase`]s, each an ordered list of [`Step`]s.
//! The [`Engine`] threads one mutable context through every step, reports
//! lifecycle events to a [`Reporter`], and stops at the first failure.

pub mod engine;
pub mod events;
pub mod phase;
pub mod step;

pub use engine::{Engine, Failure, PhaseOutcome, PhaseReport, RunResult, RunStatus};
pub use events::{NullReporter, RecordingReporter, Reporter, StepEvent};
pub use phase::{Phase, PhaseGuard};
pub use step::{Skip, Step, StepTask};
