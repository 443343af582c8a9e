//! Step definition: a titled, skippable, failable unit of work.

use super::events::{Reporter, StepEvent};
use crate::errors::StepError;
use async_trait::async_trait;

/// Outcome of a skip predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Run the step.
    No,
    /// Do not run the step, reporting this reason instead.
    Yes(String),
}

impl Skip {
    /// Skip with `reason`. An empty reason means "do not skip".
    pub fn because(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.trim().is_empty() {
            Skip::No
        } else {
            Skip::Yes(reason)
        }
    }

    /// `Skip::because(reason)` when `condition` holds, otherwise `Skip::No`.
    pub fn when(condition: bool, reason: impl Into<String>) -> Self {
        if condition {
            Skip::because(reason)
        } else {
            Skip::No
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Skip::No => None,
            Skip::Yes(reason) => Some(reason),
        }
    }
}

/// A unit of validation run by the engine.
///
/// `run` may read and write the shared context, narrate progress through
/// [`StepTask::set_title`], and fail by returning an error. Returning an
/// error aborts the whole run.
#[async_trait]
pub trait Step<C: Send + Sync>: Send + Sync {
    /// Title shown while the step is pending.
    fn title(&self) -> &str;

    /// Evaluated against the current context right before the step would run.
    async fn skip(&self, _ctx: &C) -> Skip {
        Skip::No
    }

    async fn run(&self, ctx: &mut C, task: &mut StepTask<'_>) -> Result<(), StepError>;
}

/// Progress side channel the engine hands to a running step body.
///
/// Title changes are reported immediately and never affect the step's
/// outcome.
pub struct StepTask<'a> {
    phase: &'a str,
    index: usize,
    title: String,
    reporter: &'a dyn Reporter,
}

impl<'a> StepTask<'a> {
    pub fn new(phase: &'a str, index: usize, title: &str, reporter: &'a dyn Reporter) -> Self {
        Self {
            phase,
            index,
            title: title.to_string(),
            reporter,
        }
    }

    /// Replace the title displayed for this step.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.reporter.report(&StepEvent::StepTitleUpdated {
            phase: self.phase.to_string(),
            index: self.index,
            title: self.title.clone(),
        });
    }

    /// The title currently displayed.
    pub fn title(&self) -> &str {
        &self.title
    }
}
