//! Compensating transactions
//!
//! A `Saga` is an ordered list of steps, each pairing a forward action with a
//! compensating action. When a step fails, the compensations of every step
//! that already completed run in reverse order, then the original failure is
//! returned. A failed compensation is logged and not retried.

use async_trait::async_trait;
use log::{error, info};

use crate::utils::error::IdentityResult;

/// State threaded through the steps of a saga
pub trait SagaContext: Send + Sync {
    /// Account the saga is operating on, once one exists
    fn account_id(&self) -> Option<i64>;
}

#[async_trait]
pub trait SagaStep<C: SagaContext>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut C) -> IdentityResult<()>;

    /// Undo the effects of a successful `execute`
    async fn compensate(&self, ctx: &C) -> IdentityResult<()>;
}

pub struct Saga<C: SagaContext> {
    name: &'static str,
    steps: Vec<Box<dyn SagaStep<C>>>,
}

impl<C: SagaContext> Saga<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl SagaStep<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub async fn run(&self, ctx: &mut C) -> IdentityResult<()> {
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(err) = step.execute(ctx).await {
                info!(
                    "saga={} step={} failed, compensating {} completed step(s): {}",
                    self.name,
                    step.name(),
                    index,
                    err
                );
                self.compensate(&self.steps[..index], ctx).await;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn compensate(&self, completed: &[Box<dyn SagaStep<C>>], ctx: &C) {
        let account_id = ctx
            .account_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());

        for step in completed.iter().rev() {
            match step.compensate(ctx).await {
                Ok(()) => info!(
                    "saga={} step={} account_id={} outcome=compensated",
                    self.name,
                    step.name(),
                    account_id
                ),
                Err(err) => error!(
                    "saga={} step={} account_id={} outcome=failed orphaned_pending_account=true error={}",
                    self.name,
                    step.name(),
                    account_id,
                    err
                ),
            }
        }
    }
}
