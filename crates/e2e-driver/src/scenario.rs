//! Sequential scenario execution with reverse-order teardown.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use e2e_core::E2eResult;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::params::Params;
use crate::step::Step;

/// An ordered list of steps.
///
/// [`run`](Scenario::run) executes the steps one after another and stops at
/// the first failure. Every step whose `run` was invoked is then cleaned up
/// in reverse order. A failing or panicking cleanup is logged and the
/// remaining cleanups still run.
#[derive(Default)]
pub struct Scenario {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step, returning `self` for chaining.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a boxed step.
    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the scenario has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step, then tear down.
    ///
    /// Returns the first step error, wrapped with the step's index and name.
    /// A panic inside a step is re-raised after teardown.
    pub async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let started_at = Instant::now();
        info!(scenario = %self.name, steps = self.steps.len(), "scenario starting");

        let mut invoked = 0;
        let mut outcome = Ok(());
        let mut panic = None;

        for (index, step) in self.steps.iter_mut().enumerate() {
            let name = step.name();
            invoked = index + 1;
            debug!(scenario = %self.name, index, step = %name, "running step");

            match AssertUnwindSafe(step.run(params)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(scenario = %self.name, index, step = %name, error = %e, "step failed");
                    outcome = Err(e.in_step(index, name));
                    break;
                }
                Err(payload) => {
                    error!(scenario = %self.name, index, step = %name, "step panicked");
                    panic = Some(payload);
                    break;
                }
            }
        }

        self.teardown(invoked).await;

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }

        match &outcome {
            Ok(()) => info!(
                scenario = %self.name,
                elapsed = ?started_at.elapsed(),
                "scenario passed"
            ),
            Err(e) => warn!(scenario = %self.name, error = %e, "scenario failed"),
        }
        outcome
    }

    async fn teardown(&mut self, invoked: usize) {
        for (index, step) in self.steps[..invoked].iter_mut().enumerate().rev() {
            let name = step.name();
            match AssertUnwindSafe(step.cleanup()).catch_unwind().await {
                Ok(Ok(())) => debug!(scenario = %self.name, index, step = %name, "cleaned up"),
                Ok(Err(e)) => {
                    warn!(scenario = %self.name, index, step = %name, error = %e, "cleanup failed")
                }
                Err(_) => error!(scenario = %self.name, index, step = %name, "cleanup panicked"),
            }
        }
    }
}
