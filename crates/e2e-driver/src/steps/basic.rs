use std::time::Duration;

use async_trait::async_trait;
use e2e_core::E2eResult;
use tracing::debug;

use crate::params::Params;
use crate::step::Step;

/// Wait for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct Sleep(pub Duration);

#[async_trait]
impl Step for Sleep {
    fn name(&self) -> String {
        format!("sleep {:?}", self.0)
    }

    async fn run(&mut self, _params: &mut Params) -> E2eResult<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Run a step `count` times in sequence.
///
/// Each iteration completes before the next starts, so the number of
/// requests a repeated probe sends is exact. The first failing iteration
/// ends the step. The inner step is cleaned up once, after the last
/// iteration that ran.
pub struct Repeat {
    count: usize,
    step: Box<dyn Step>,
    ran: bool,
}

impl Repeat {
    /// Repeat `step` `count` times.
    pub fn new(count: usize, step: impl Step + 'static) -> Self {
        Self {
            count,
            step: Box::new(step),
            ran: false,
        }
    }

    /// Number of iterations.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl std::fmt::Debug for Repeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repeat")
            .field("count", &self.count)
            .field("step", &self.step.name())
            .finish()
    }
}

#[async_trait]
impl Step for Repeat {
    fn name(&self) -> String {
        format!("repeat {} x {}", self.count, self.step.name())
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        for iteration in 0..self.count {
            self.ran = true;
            debug!(iteration, count = self.count, step = %self.step.name(), "repeat");
            self.step
                .run(params)
                .await
                .map_err(|e| e.in_step(iteration, "iteration"))?;
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        if std::mem::take(&mut self.ran) {
            self.step.cleanup().await?;
        }
        Ok(())
    }
}
