//! Lifecycle callbacks.

use std::fmt;

use tracing::debug;

use crate::error::MigrateResult;

/// Points in the migrate/validate pipeline where callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Before any migration runs.
    BeforeMigrate,
    /// Before the ledger is validated against discovered migrations.
    BeforeValidate,
    /// After successful validation.
    AfterValidate,
    /// After all migrations ran.
    AfterMigrate,
}

impl Event {
    /// Stable identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::BeforeMigrate => "beforeMigrate",
            Self::BeforeValidate => "beforeValidate",
            Self::AfterValidate => "afterValidate",
            Self::AfterMigrate => "afterMigrate",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A hook invoked at lifecycle events.
#[async_trait::async_trait]
pub trait Callback: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this callback handles the event.
    fn supports(&self, event: Event) -> bool;

    /// Whether this callback may run inside the pipeline's transaction.
    fn can_handle_in_transaction(&self, event: Event) -> bool;

    /// Handle the event.
    async fn handle(&self, event: Event) -> MigrateResult<()>;
}

/// Runs registered callbacks in registration order.
#[derive(Default)]
pub struct CallbackExecutor {
    callbacks: Vec<Box<dyn Callback>>,
}

impl CallbackExecutor {
    /// Create an executor with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn register(&mut self, callback: impl Callback + 'static) -> &mut Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Whether every callback supporting the event may run in a transaction.
    pub fn can_run_in_transaction(&self, event: Event) -> bool {
        self.callbacks
            .iter()
            .filter(|c| c.supports(event))
            .all(|c| c.can_handle_in_transaction(event))
    }

    /// Run every callback supporting the event. Stops at the first error.
    pub async fn fire(&self, event: Event) -> MigrateResult<usize> {
        let mut handled = 0;
        for callback in self.callbacks.iter().filter(|c| c.supports(event)) {
            debug!(callback = callback.name(), event = %event, "Executing callback");
            callback.handle(event).await?;
            handled += 1;
        }
        Ok(handled)
    }
}
