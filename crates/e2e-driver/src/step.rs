//! The unit of work a scenario is built from.

use async_trait::async_trait;
use e2e_core::E2eResult;

use crate::params::Params;

/// One setup, action or verification step of a scenario.
///
/// `cleanup` is called at most once, after `run` was invoked, whether or not
/// `run` succeeded. Steps holding nothing to release keep the default.
#[async_trait]
pub trait Step: Send {
    /// Short description used in logs and errors.
    fn name(&self) -> String;

    /// Execute the step.
    async fn run(&mut self, params: &mut Params) -> E2eResult<()>;

    /// Release what `run` acquired.
    async fn cleanup(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: Step + ?Sized> Step for Box<S> {
    fn name(&self) -> String {
        (**self).name()
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        (**self).run(params).await
    }

    async fn cleanup(&mut self) -> E2eResult<()> {
        (**self).cleanup().await
    }
}
