use async_trait::async_trait;
use tracing::{error, warn};

/// One compensable step of a saga. `run` performs the step; `compensate`
/// undoes it. `compensate` is only ever called for steps whose `run`
/// already succeeded, in reverse order of execution.
#[async_trait]
pub trait SagaStep<Ctx: Send + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &Ctx) -> pomodex_core::Result<()>;

    /// Best-effort undo. Compensation failures are logged, not propagated —
    /// the saga has already failed and there's nothing more useful to do
    /// than leave a trace for an operator.
    async fn compensate(&self, ctx: &Ctx);
}

#[derive(Debug, thiserror::Error)]
#[error("saga step '{step}' failed: {source}")]
pub struct SagaError {
    pub step: &'static str,
    #[source]
    pub source: pomodex_core::PomodexError,
}

pub struct SagaRunner<Ctx> {
    steps: Vec<Box<dyn SagaStep<Ctx>>>,
}

impl<Ctx: Send + Sync> SagaRunner<Ctx> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn step(mut self, step: Box<dyn SagaStep<Ctx>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Runs every step in order. On the first failure, compensates the
    /// steps that already succeeded, most-recent first, then returns the
    /// original error.
    pub async fn run(&self, ctx: &Ctx) -> Result<(), SagaError> {
        let mut completed: Vec<&Box<dyn SagaStep<Ctx>>> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            match step.run(ctx).await {
                Ok(()) => completed.push(step),
                Err(source) => {
                    error!(step = step.name(), error = %source, "saga step failed, compensating");
                    for done in completed.into_iter().rev() {
                        warn!(step = done.name(), "compensating");
                        done.compensate(ctx).await;
                    }
                    return Err(SagaError { step: step.name(), source });
                }
            }
        }

        Ok(())
    }
}

impl<Ctx: Send + Sync> Default for SagaRunner<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Ctx {
        log: Mutex<Vec<String>>,
    }

    impl Ctx {
        fn new() -> Self {
            Self { log: Mutex::new(Vec::new()) }
        }

        fn record(&self, event: impl Into<String>) {
            self.log.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    struct Succeeds(&'static str);

    #[async_trait]
    impl SagaStep<Ctx> for Succeeds {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, ctx: &Ctx) -> pomodex_core::Result<()> {
            ctx.record(format!("run:{}", self.0));
            Ok(())
        }

        async fn compensate(&self, ctx: &Ctx) {
            ctx.record(format!("compensate:{}", self.0));
        }
    }

    struct Fails(&'static str);

    #[async_trait]
    impl SagaStep<Ctx> for Fails {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, ctx: &Ctx) -> pomodex_core::Result<()> {
            ctx.record(format!("run:{}", self.0));
            Err(pomodex_core::PomodexError::Backend("boom".into()))
        }

        async fn compensate(&self, ctx: &Ctx) {
            ctx.record(format!("compensate:{}", self.0));
        }
    }

    #[tokio::test]
    async fn all_steps_succeed_runs_each_once_with_no_compensation() {
        let ctx = Ctx::new();
        let runner = SagaRunner::new().step(Box::new(Succeeds("a"))).step(Box::new(Succeeds("b")));

        let result = runner.run(&ctx).await;

        assert!(result.is_ok());
        assert_eq!(ctx.events(), vec!["run:a", "run:b"]);
    }

    #[tokio::test]
    async fn failure_compensates_completed_steps_in_reverse_order() {
        let ctx = Ctx::new();
        let runner = SagaRunner::new()
            .step(Box::new(Succeeds("a")))
            .step(Box::new(Succeeds("b")))
            .step(Box::new(Fails("c")))
            .step(Box::new(Succeeds("d")));

        let err = runner.run(&ctx).await.unwrap_err();

        assert_eq!(err.step, "c");
        assert_eq!(ctx.events(), vec!["run:a", "run:b", "run:c", "compensate:b", "compensate:a"]);
    }

    #[tokio::test]
    async fn first_step_failure_runs_no_compensation() {
        let ctx = Ctx::new();
        let runner = SagaRunner::new().step(Box::new(Fails("a"))).step(Box::new(Succeeds("b")));

        let err = runner.run(&ctx).await.unwrap_err();

        assert_eq!(err.step, "a");
        assert_eq!(ctx.events(), vec!["run:a"]);
    }
}
