//! Stream.Security provider
//!
//! Onboards cloud accounts (AWS, Azure, GCP, Google Workspace) into a
//! Stream.Security workspace. Every resource type is a [`ResourceHandler`]
//! registered in [`StreamsecProvider`], which implements the core `Provider`
//! trait on top of a single logged-in [`ApiClient`].

pub mod client;
pub mod config;
pub mod data_sources;
pub mod handler;
pub mod models;
pub mod resources;

use std::collections::HashMap;

use log::{debug, info};
use streamsec_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, ResourceId, State};
use streamsec_core::schema::ResourceSchema;

pub use client::{ApiClient, ClientError};
pub use config::{ConfigError, ProviderConfig};
pub use handler::{DataSourceHandler, ResourceHandler};

pub struct StreamsecProvider {
    client: ApiClient,
    resources: HashMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl StreamsecProvider {
    /// Log in with the given settings and register every handler
    pub async fn connect(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = ApiClient::connect(config).await.map_err(|e| {
            ProviderError::new("Unable to Create Stream.Security API Client").with_cause(e)
        })?;
        info!("Connected to {}", client.base_url());
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: ApiClient) -> Self {
        let resources = resources::all()
            .into_iter()
            .map(|h| (h.type_name(), h))
            .collect();
        let data_sources = data_sources::all()
            .into_iter()
            .map(|h| (h.type_name(), h))
            .collect();
        Self {
            client,
            resources,
            data_sources,
        }
    }

    fn resource(&self, id: &ResourceId) -> ProviderResult<&dyn ResourceHandler> {
        self.resources
            .get(id.resource_type.as_str())
            .map(|h| h.as_ref())
            .ok_or_else(|| {
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    fn data_source(&self, id: &ResourceId) -> ProviderResult<&dyn DataSourceHandler> {
        self.data_sources
            .get(id.resource_type.as_str())
            .map(|h| h.as_ref())
            .ok_or_else(|| {
                ProviderError::new(format!("Unknown data source type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }
}

/// Check configured attributes before anything reaches the API
fn validate(schema: &ResourceSchema, resource: &Resource) -> ProviderResult<()> {
    schema.validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ProviderError::new(format!("Invalid configuration: {}", messages.join("; ")))
            .for_resource(resource.id.clone())
    })
}

fn tag(id: &ResourceId) -> impl FnOnce(ProviderError) -> ProviderError + '_ {
    move |e| match e.resource_id {
        Some(_) => e,
        None => e.for_resource(id.clone()),
    }
}

impl Provider for StreamsecProvider {
    fn name(&self) -> &'static str {
        "streamsec"
    }

    fn resource_schemas(&self) -> Vec<ResourceSchema> {
        let mut schemas: Vec<_> = self.resources.values().map(|h| h.schema()).collect();
        schemas.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        schemas
    }

    fn data_source_schemas(&self) -> Vec<ResourceSchema> {
        let mut schemas: Vec<_> = self.data_sources.values().map(|h| h.schema()).collect();
        schemas.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        schemas
    }

    fn read<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            let handler = self.resource(&current.id)?;
            debug!("Reading {}", current.id);
            match handler.read(&self.client, current).await.map_err(tag(&current.id))? {
                Some(state) => Ok(state),
                None => {
                    info!("{} no longer exists, removing it from state", current.id);
                    Ok(State::not_found(current.id.clone()))
                }
            }
        })
    }

    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            let handler = self.resource(&resource.id)?;
            validate(&handler.schema(), resource)?;
            debug!("Creating {}", resource.id);
            handler
                .create(&self.client, resource)
                .await
                .map_err(tag(&resource.id))
        })
    }

    fn update<'a>(
        &'a self,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            let handler = self.resource(&to.id)?;
            validate(&handler.schema(), to)?;
            debug!("Updating {}", to.id);
            handler
                .update(&self.client, from, to)
                .await
                .map_err(tag(&to.id))
        })
    }

    fn delete<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let handler = self.resource(&current.id)?;
            debug!("Deleting {}", current.id);
            handler
                .delete(&self.client, current)
                .await
                .map_err(tag(&current.id))
        })
    }

    fn import<'a>(
        &'a self,
        resource_type: &'a str,
        name: &'a str,
        import_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            let id = ResourceId::new(resource_type, name);
            let handler = self.resource(&id)?;
            let seed = handler.import_state(id.clone(), import_id).map_err(tag(&id))?;
            debug!("Importing {} from {}", id, import_id);
            handler
                .read(&self.client, &seed)
                .await
                .map_err(tag(&id))?
                .ok_or_else(|| {
                    ProviderError::new(format!(
                        "Cannot import non-existent remote object: {}",
                        import_id
                    ))
                    .for_resource(id.clone())
                })
        })
    }

    fn read_data_source<'a>(
        &'a self,
        query: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            let handler = self.data_source(&query.id)?;
            validate(&handler.schema(), query)?;
            debug!("Reading data source {}", query.id);
            handler
                .read(&self.client, query)
                .await
                .map_err(tag(&query.id))
        })
    }
}
