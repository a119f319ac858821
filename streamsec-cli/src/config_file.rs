//! The JSON configuration file
//!
//! ```json
//! {
//!   "provider": { "host": "acme.streamsec.io" },
//!   "backend": { "type": "local", "path": "prod.state.json" },
//!   "data": [
//!     { "type": "aws_account", "name": "existing", "attributes": { "cloud_account_id": "123456789012" } }
//!   ],
//!   "resources": [
//!     { "type": "aws_account_ack", "name": "prod", "attributes": {
//!         "cloud_account_id": "${data.aws_account.existing.cloud_account_id}" } }
//!   ]
//! }
//! ```
//!
//! A `${type.name.attribute}` string refers to a resource declared earlier in
//! `resources`; data sources are referenced as `${data.type.name.attribute}`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use streamsec_core::convert::attributes_from_json;
use streamsec_core::resource::{Attributes, Resource, Value};
use streamsec_state::BackendConfig;

/// Binding prefix of data sources
pub const DATA_PREFIX: &str = "data.";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    provider: serde_json::Value,
    #[serde(default)]
    backend: Option<BackendConfig>,
    #[serde(default)]
    data: Vec<RawBlock>,
    #[serde(default)]
    resources: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBlock {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Value,
}

#[derive(Debug)]
pub struct Configuration {
    pub provider: Attributes,
    pub backend: BackendConfig,
    /// Data sources, in declaration order
    pub data_sources: Vec<Resource>,
    /// Managed resources, in declaration order
    pub resources: Vec<Resource>,
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let raw: RawConfig =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        let provider = match &raw.provider {
            serde_json::Value::Null => Attributes::new(),
            serde_json::Value::Object(_) => attributes_from_json(&raw.provider),
            _ => return Err("'provider' must be an object".to_string()),
        };

        let data_sources = raw
            .data
            .into_iter()
            .map(|b| block_to_resource(b, true))
            .collect::<Result<Vec<_>, _>>()?;
        let resources = raw
            .resources
            .into_iter()
            .map(|b| block_to_resource(b, false))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            provider,
            backend: raw.backend.unwrap_or_default(),
            data_sources,
            resources,
        };
        config.check_references()?;
        Ok(config)
    }

    /// Every block, data sources first
    pub fn all(&self) -> impl Iterator<Item = &Resource> {
        self.data_sources.iter().chain(&self.resources)
    }

    /// Bindings must be unique and references must point backwards
    fn check_references(&self) -> Result<(), String> {
        let mut known: HashSet<String> = HashSet::new();

        for resource in self.all() {
            let kind = if resource.is_data_source() { "data source" } else { "resource" };
            let binding = binding_of(resource);
            if known.contains(&binding) {
                return Err(format!("Duplicate {}: {}", kind, binding));
            }

            let mut refs = Vec::new();
            for value in resource.attributes.values() {
                collect_references(value, &mut refs);
            }
            refs.sort();
            for (target, attr) in refs {
                if !known.contains(&target) {
                    return Err(format!(
                        "{} {}: reference to unknown or later binding '{}.{}'",
                        kind, resource.id, target, attr
                    ));
                }
            }

            known.insert(binding);
        }
        Ok(())
    }
}

fn block_to_resource(block: RawBlock, data: bool) -> Result<Resource, String> {
    if block.name.is_empty() || block.name.contains('.') {
        return Err(format!(
            "Invalid name '{}' for {}: names must be non-empty and contain no '.'",
            block.name, block.resource_type
        ));
    }
    let attributes = match &block.attributes {
        serde_json::Value::Null => Attributes::new(),
        serde_json::Value::Object(_) => attributes_from_json(&block.attributes),
        _ => {
            return Err(format!(
                "{}.{}: 'attributes' must be an object",
                block.resource_type, block.name
            ));
        }
    };
    let mut resource = Resource::new(block.resource_type, block.name).with_read_only(data);
    resource.attributes = attributes;
    Ok(resource)
}

/// Name other blocks use to refer to this one
pub fn binding_of(resource: &Resource) -> String {
    if resource.is_data_source() {
        format!("{}{}", DATA_PREFIX, resource.binding())
    } else {
        resource.binding()
    }
}

fn collect_references(value: &Value, refs: &mut Vec<(String, String)>) {
    match value {
        Value::ResourceRef(binding, attr) => refs.push((binding.clone(), attr.clone())),
        Value::List(items) => items.iter().for_each(|v| collect_references(v, refs)),
        Value::Map(map) => map.values().for_each(|v| collect_references(v, refs)),
        _ => {}
    }
}

/// Known attributes of every evaluated block, keyed by binding
#[derive(Debug, Default)]
pub struct Bindings(HashMap<String, Attributes>);

impl Bindings {
    /// Record a block: its state overlaid with the configured values already resolved
    pub fn insert(&mut self, binding: String, state: &Attributes, configured: &Attributes) {
        let mut attrs = state.clone();
        attrs.extend(
            configured
                .iter()
                .filter(|(_, v)| !matches!(v, Value::ResourceRef(_, _)))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.0.insert(binding, attrs);
    }

    /// Substitute every reference whose target is already known
    pub fn resolve(&self, resource: &Resource) -> Resource {
        let mut resolved = resource.clone();
        resolved.attributes = resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v)))
            .collect();
        resolved
    }

    fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::ResourceRef(binding, attr) => match self.0.get(binding).and_then(|a| a.get(attr)) {
                Some(target) => self.resolve_value(target),
                None => value.clone(),
            },
            Value::List(items) => Value::List(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}
