//! Sequential, fail-fast pipeline engine.
//!
//! The engine owns nothing but a reporter. The caller owns the context and
//! lends it mutably for the duration of [`Engine::run`], so independent runs
//! never share state.

use super::events::{Reporter, StepEvent};
use super::phase::Phase;
use super::step::StepTask;
use crate::errors::StepError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How a single phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every step succeeded or was skipped.
    Completed { ran: usize, skipped: usize },
    /// The phase guard skipped the phase; none of its steps were touched.
    Skipped { reason: String },
    /// The named step failed.
    Failed { step: String },
    /// An earlier phase failed before this one could start.
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub name: String,
    pub outcome: PhaseOutcome,
}

/// A step failure together with where it originated.
#[derive(Debug)]
pub struct Failure {
    pub phase: String,
    pub step: String,
    pub error: StepError,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} › {}: {}", self.phase, self.step, self.error)
    }
}

/// Classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// No failure, but at least one phase was skipped by its guard.
    PartiallySkipped,
    Failed,
}

/// Terminal state of one pipeline run.
#[derive(Debug)]
pub struct RunResult {
    /// One report per declared phase, in declaration order.
    pub phases: Vec<PhaseReport>,
    pub failure: Option<Failure>,
}

impl RunResult {
    pub fn status(&self) -> RunStatus {
        if self.failure.is_some() {
            RunStatus::Failed
        } else if self
            .phases
            .iter()
            .any(|p| matches!(p.outcome, PhaseOutcome::Skipped { .. }))
        {
            RunStatus::PartiallySkipped
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Process exit status for this result: 0 unless a step failed.
    pub fn exit_code(&self) -> i32 {
        match self.status() {
            RunStatus::Succeeded | RunStatus::PartiallySkipped => 0,
            RunStatus::Failed => 1,
        }
    }
}

/// Runs phases in order, steps in order, stopping at the first failure.
pub struct Engine {
    reporter: Arc<dyn Reporter>,
}

impl Engine {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    fn emit(&self, event: StepEvent) {
        debug!(?event, "pipeline event");
        self.reporter.report(&event);
    }

    /// Run `phases` against `ctx`.
    ///
    /// Each step's skip predicate sees every mutation made by the steps
    /// before it. The first step error ends the run: no further step or
    /// phase starts, and the error is returned inside the result rather
    /// than propagated.
    pub async fn run<C: Send + Sync>(&self, phases: &[Phase<C>], ctx: &mut C) -> RunResult {
        let mut reports = Vec::with_capacity(phases.len());

        for (position, phase) in phases.iter().enumerate() {
            let name = phase.name().to_string();

            if let Some(guard) = phase.guard_ref()
                && let Some(reason) = non_empty(guard.skip(ctx).await.reason())
            {
                info!(phase = %name, %reason, "phase skipped");
                self.emit(StepEvent::PhaseSkipped {
                    phase: name.clone(),
                    reason: reason.clone(),
                });
                reports.push(PhaseReport {
                    name,
                    outcome: PhaseOutcome::Skipped { reason },
                });
                continue;
            }

            info!(phase = %name, steps = phase.steps().len(), "phase started");
            self.emit(StepEvent::PhaseStarted {
                phase: name.clone(),
                steps: phase.steps().len(),
            });
            for (index, step) in phase.steps().iter().enumerate() {
                self.emit(StepEvent::StepPending {
                    phase: name.clone(),
                    index,
                    title: step.title().to_string(),
                });
            }

            let mut ran = 0;
            let mut skipped = 0;
            for (index, step) in phase.steps().iter().enumerate() {
                if let Some(reason) = non_empty(step.skip(ctx).await.reason()) {
                    skipped += 1;
                    self.emit(StepEvent::StepSkipped {
                        phase: name.clone(),
                        index,
                        title: step.title().to_string(),
                        reason,
                    });
                    continue;
                }

                self.emit(StepEvent::StepRunning {
                    phase: name.clone(),
                    index,
                    title: step.title().to_string(),
                });

                let started = Instant::now();
                let mut task = StepTask::new(&name, index, step.title(), self.reporter.as_ref());
                let outcome = step.run(ctx, &mut task).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let title = task.title().to_string();

                match outcome {
                    Ok(()) => {
                        ran += 1;
                        self.emit(StepEvent::StepSucceeded {
                            phase: name.clone(),
                            index,
                            title,
                            elapsed_ms,
                        });
                    }
                    Err(error) => {
                        info!(phase = %name, step = step.title(), %error, "step failed");
                        self.emit(StepEvent::StepFailed {
                            phase: name.clone(),
                            index,
                            title,
                            message: error.to_string(),
                            elapsed_ms,
                        });
                        self.emit(StepEvent::PhaseFailed {
                            phase: name.clone(),
                            step: step.title().to_string(),
                        });
                        self.emit(StepEvent::RunCompleted { success: false });

                        reports.push(PhaseReport {
                            name: name.clone(),
                            outcome: PhaseOutcome::Failed {
                                step: step.title().to_string(),
                            },
                        });
                        reports.extend(phases[position + 1..].iter().map(|p| PhaseReport {
                            name: p.name().to_string(),
                            outcome: PhaseOutcome::NotRun,
                        }));

                        return RunResult {
                            phases: reports,
                            failure: Some(Failure {
                                phase: name,
                                step: step.title().to_string(),
                                error,
                            }),
                        };
                    }
                }
            }

            info!(phase = %name, ran, skipped, "phase completed");
            self.emit(StepEvent::PhaseCompleted {
                phase: name.clone(),
            });
            reports.push(PhaseReport {
                name,
                outcome: PhaseOutcome::Completed { ran, skipped },
            });
        }

        self.emit(StepEvent::RunCompleted { success: true });
        RunResult {
            phases: reports,
            failure: None,
        }
    }
}

fn non_empty(reason: Option<&str>) -> Option<String> {
    reason
        .filter(|r| !r.trim().is_empty())
        .map(str::to_string)
}
