//! Handler traits implemented by every resource and data source type

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use streamsec_core::convert::attributes_to_json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Attributes, Resource, ResourceId, State, Value};
use streamsec_core::schema::ResourceSchema;

use crate::client::{ApiClient, ClientError};

/// CRUD for one managed resource type
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name (e.g., "aws_account")
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Attribute an import id is written into before the first read
    fn import_attribute(&self) -> &'static str {
        "id"
    }

    /// Seed state for `import`; the provider reads it right after
    fn import_state(&self, id: ResourceId, import_id: &str) -> ProviderResult<State> {
        let mut attributes = Attributes::new();
        attributes.insert(
            self.import_attribute().to_string(),
            Value::String(import_id.to_string()),
        );
        Ok(State::existing(id, attributes))
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State>;

    /// Refresh from the API; `None` means the object is gone and leaves state
    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>>;

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource)
    -> ProviderResult<State>;

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()>;
}

/// Lookup for one data source type
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, client: &ApiClient, query: &Resource) -> ProviderResult<State>;
}

/// Decode configured attributes into a typed input model
pub(crate) fn decode<T: DeserializeOwned>(resource: &Resource) -> ProviderResult<T> {
    if let Some((name, Value::ResourceRef(binding, attr))) = resource
        .attributes
        .iter()
        .find(|(_, v)| matches!(v, Value::ResourceRef(_, _)))
    {
        return Err(ProviderError::new(format!(
            "Attribute '{}' refers to {}.{}, which is not known yet",
            name, binding, attr
        )));
    }

    serde_json::from_value(attributes_to_json(&resource.attributes))
        .map_err(|e| ProviderError::new("Invalid configuration").with_cause(e))
}

/// A string attribute the state must carry
pub(crate) fn state_str<'a>(state: &'a State, key: &str) -> ProviderResult<&'a str> {
    state
        .get_str(key)
        .ok_or_else(|| ProviderError::new(format!("Attribute '{}' is missing from state", key)))
}

/// Wrap an API failure with the operation that failed
pub(crate) fn api_error(context: &'static str) -> impl FnOnce(ClientError) -> ProviderError {
    move |e| ProviderError::new(format!("{}, got error", context)).with_cause(e)
}

pub(crate) fn account_not_found(cloud_account_id: &str) -> ProviderError {
    ProviderError::new(format!(
        "Unable to get account, account with cloud_account_id: {} not found in Stream.Security API.",
        cloud_account_id
    ))
}

pub(crate) fn deleting(what: &str, key: &str) -> ProviderError {
    ProviderError::new(format!(
        "Resource status is DELETING: {} with id: {} is being deleted.",
        what, key
    ))
}

/// Builds the attribute map of a state
///
/// `None` values are skipped so an attribute the API omitted stays unknown.
#[derive(Debug, Default)]
pub(crate) struct StateAttributes(Attributes);

impl StateAttributes {
    /// Start from the configured attributes
    pub fn from_resource(resource: &Resource) -> Self {
        Self(resource.attributes.clone())
    }

    /// Start from prior state overlaid with the new configuration
    pub fn carry_over(from: &State, to: &Resource) -> Self {
        let mut attributes = from.attributes.clone();
        attributes.extend(to.attributes.clone());
        Self(attributes)
    }

    pub fn from_state(state: &State) -> Self {
        Self(state.attributes.clone())
    }

    pub fn string(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.0.insert(key.to_string(), Value::String(value.into()));
        }
        self
    }

    pub fn list(mut self, key: &str, values: Option<Vec<String>>) -> Self {
        if let Some(values) = values {
            self.0.insert(
                key.to_string(),
                streamsec_core::convert::from_string_list(values),
            );
        }
        self
    }

    pub fn map(mut self, key: &str, values: Option<&std::collections::HashMap<String, String>>) -> Self {
        if let Some(values) = values {
            self.0.insert(
                key.to_string(),
                streamsec_core::convert::from_string_map(values),
            );
        }
        self
    }

    pub fn into_state(self, id: ResourceId) -> State {
        State::existing(id, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Input {
        display_name: String,
        cloud_regions: Vec<String>,
    }

    #[test]
    fn decode_typed_input() {
        let resource = Resource::new("aws_account", "prod")
            .with_attribute("display_name", Value::String("prod".to_string()))
            .with_attribute(
                "cloud_regions",
                Value::List(vec![Value::String("us-east-1".to_string())]),
            );
        let input: Input = decode(&resource).unwrap();
        assert_eq!(input.display_name, "prod");
        assert_eq!(input.cloud_regions, vec!["us-east-1"]);
    }

    #[test]
    fn decode_rejects_unresolved_references() {
        let resource = Resource::new("aws_account_ack", "prod").with_attribute(
            "cloud_account_id",
            Value::ResourceRef("aws_account.prod".to_string(), "cloud_account_id".to_string()),
        );
        let err = decode::<serde_json::Value>(&resource).unwrap_err();
        assert!(err.message.contains("aws_account.prod.cloud_account_id"));
    }

    #[test]
    fn state_attributes_skip_unknown_values() {
        let state = StateAttributes::default()
            .string("id", Some("64f0c1"))
            .string("template_url", None::<String>)
            .into_state(ResourceId::new("aws_account", "prod"));
        assert_eq!(state.identifier.as_deref(), Some("64f0c1"));
        assert!(!state.attributes.contains_key("template_url"));
    }

    #[test]
    fn carry_over_keeps_computed_values() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), Value::String("64f0c1".to_string()));
        attrs.insert("display_name".to_string(), Value::String("old".to_string()));
        let from = State::existing(ResourceId::new("azure_tenant", "main"), attrs);
        let to = Resource::new("azure_tenant", "main")
            .with_attribute("display_name", Value::String("new".to_string()));

        let state = StateAttributes::carry_over(&from, &to).into_state(to.id.clone());
        assert_eq!(state.get_str("id"), Some("64f0c1"));
        assert_eq!(state.get_str("display_name"), Some("new"));
    }
}
