//! Phase definition: an ordered, named group of steps with an optional guard.

use super::step::{Skip, Step};
use async_trait::async_trait;

/// Precondition evaluated before a phase touches any of its steps.
#[async_trait]
pub trait PhaseGuard<C: Send + Sync>: Send + Sync {
    async fn skip(&self, ctx: &C) -> Skip;
}

/// An ordered sequence of steps sharing one context.
///
/// Steps run strictly one after another because later steps read what
/// earlier ones wrote.
pub struct Phase<C: Send + Sync> {
    name: String,
    steps: Vec<Box<dyn Step<C>>>,
    guard: Option<Box<dyn PhaseGuard<C>>>,
}

impl<C: Send + Sync> Phase<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            guard: None,
        }
    }

    /// Append a step. Steps run in the order they were added.
    pub fn step(mut self, step: impl Step<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Guard the whole phase. A `Skip::Yes` from the guard skips every step.
    pub fn guard(mut self, guard: impl PhaseGuard<C> + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Box<dyn Step<C>>] {
        &self.steps
    }

    pub(crate) fn guard_ref(&self) -> Option<&dyn PhaseGuard<C>> {
        self.guard.as_deref()
    }
}

impl<C: Send + Sync> std::fmt::Debug for Phase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field(
                "steps",
                &self.steps.iter().map(|s| s.title()).collect::<Vec<_>>(),
            )
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}
