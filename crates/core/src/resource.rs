//! Per-task resource boundary.
//!
//! Every task gets its own handle from a [`ResourceProvider`]. The handle is
//! committed when the task succeeds and rolled back when it fails or panics.
//! A database provider would map `open` to `BEGIN`, `commit` to `COMMIT` and
//! `rollback` to `ROLLBACK`.

use crate::error::BoxError;
use crate::task::TaskContext;
use async_trait::async_trait;

/// Source of transactional handles passed into task bodies.
#[async_trait]
pub trait ResourceProvider: Send + Sync + 'static {
    /// Handle given to `execute` and `validate`. Cloned per call; all clones
    /// belong to the same task.
    type Handle: Clone + Send + Sync + 'static;

    /// Open a boundary for one task.
    async fn open(&self, ctx: &TaskContext) -> Result<Self::Handle, BoxError>;

    /// Make the task's changes durable.
    async fn commit(&self, handle: Self::Handle) -> Result<(), BoxError>;

    /// Discard the task's changes.
    async fn rollback(&self, handle: Self::Handle) -> Result<(), BoxError>;
}

/// Provider for tasks that need no transactional resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

#[async_trait]
impl ResourceProvider for NoopProvider {
    type Handle = ();

    async fn open(&self, _ctx: &TaskContext) -> Result<(), BoxError> {
        Ok(())
    }

    async fn commit(&self, _handle: ()) -> Result<(), BoxError> {
        Ok(())
    }

    async fn rollback(&self, _handle: ()) -> Result<(), BoxError> {
        Ok(())
    }
}
