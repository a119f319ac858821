//! Provider - the seam between planning and a remote API
//!
//! A Provider knows a set of resource and data source types and turns
//! Effects into calls against its remote API.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Failure of one provider call
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.resource_id, &self.cause) {
            (Some(id), Some(cause)) => write!(f, "[{}] {}: {}", id, self.message, cause),
            (Some(id), None) => write!(f, "[{}] {}", id, self.message),
            (None, Some(cause)) => write!(f, "{}: {}", self.message, cause),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations a planner needs from a remote API
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "streamsec")
    fn name(&self) -> &'static str;

    /// Schemas of every managed resource type
    fn resource_schemas(&self) -> Vec<ResourceSchema>;

    /// Schemas of every data source type
    fn data_source_schemas(&self) -> Vec<ResourceSchema>;

    /// Refresh a resource from the remote API
    ///
    /// Returns `State::not_found()` when the resource is gone and should be
    /// removed from state.
    fn read<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<State>>;

    /// Create a resource
    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>>;

    /// Update a resource in place
    fn update<'a>(
        &'a self,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Delete a resource
    fn delete<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<()>>;

    /// Bring an existing remote object under management
    fn import<'a>(
        &'a self,
        resource_type: &'a str,
        name: &'a str,
        import_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Evaluate a data source
    fn read_data_source<'a>(&'a self, query: &'a Resource)
    -> BoxFuture<'a, ProviderResult<State>>;
}
