//! The asynchronous repository contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RepoError, Result};
use crate::query::{SearchQuery, Stage};

/// Rebuilds a typed entity from a stored document.
///
/// The document uses domain property names: the backend identifier field has
/// already been mapped back to the identifier key.
pub type HydrateFn<T> = Arc<dyn Fn(Value) -> Result<T> + Send + Sync>;

/// Hydration through `serde`.
pub fn serde_hydrator<T: DeserializeOwned + 'static>() -> HydrateFn<T> {
    Arc::new(|document| {
        serde_json::from_value(document).map_err(|e| RepoError::Hydration(e.to_string()))
    })
}

/// Persistence operations for one entity class.
///
/// Reads fail with [`RepoError::HydrationNotConfigured`] until
/// [`on_hydrate`](Repository::on_hydrate) has been called.
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Register the hydration function used by reads.
    fn on_hydrate(&self, hydrate: HydrateFn<T>);

    /// All stored entities.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// The entity with an identifier, if stored.
    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Store a new entity and return its identifier.
    async fn insert(&self, entity: &T) -> Result<String>;

    /// Replace a stored entity.
    async fn update(&self, entity: &T) -> Result<()>;

    /// Remove a stored entity.
    async fn delete(&self, entity: &T) -> Result<()>;

    /// Entities matching a query.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<T>>;

    /// Run an aggregation pipeline over raw stored documents.
    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Value>>;
}
