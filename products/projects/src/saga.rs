use std::future::Future;

use futures::future::BoxFuture;
use platform_backend::BackendResult;
use tracing::{debug, warn};

struct Compensation<'a> {
    step: &'static str,
    undo: BoxFuture<'a, BackendResult<()>>,
}

/// Ordered multi-step write with registered compensations.
///
/// Each forward step that succeeds registers the action that undoes it.
/// [`Saga::abort`] runs the registered compensations newest first; a failing
/// compensation is logged and the rest still run. [`Saga::commit`] discards
/// them. Compensations are lazy futures and do nothing until aborted.
pub struct Saga<'a> {
    name: &'static str,
    compensations: Vec<Compensation<'a>>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    pub fn on_abort<F>(&mut self, step: &'static str, undo: F)
    where
        F: Future<Output = BackendResult<()>> + Send + 'a,
    {
        self.compensations.push(Compensation {
            step,
            undo: Box::pin(undo),
        });
    }

    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    pub fn commit(self) {
        debug!(saga = self.name, steps = self.compensations.len(), "saga committed");
    }

    /// Roll back every completed step. Never fails and never retries.
    pub async fn abort(self) {
        let name = self.name;
        for compensation in self.compensations.into_iter().rev() {
            match compensation.undo.await {
                Ok(()) => debug!(saga = name, step = compensation.step, "compensated"),
                Err(err) => warn!(
                    saga = name,
                    step = compensation.step,
                    error = %err,
                    "compensation failed"
                ),
            }
        }
    }
}
