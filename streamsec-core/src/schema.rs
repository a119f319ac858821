//! Schema - Define type schemas for resources and data sources
//!
//! Every resource handler declares a schema, which is checked against the
//! configuration before any request reaches the API.

use std::collections::HashMap;
use std::fmt;

use crate::resource::{Attributes, Value};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // References resolve to strings at apply time; the target is checked then
            (AttributeType::String, Value::String(_) | Value::ResourceRef(_, _)) => Ok(()),
            (AttributeType::Custom { .. }, Value::ResourceRef(_, _)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the API, never by the configuration
    pub computed: bool,
    /// Masked in plan output
    pub sensitive: bool,
    /// A change to this attribute destroys and recreates the resource
    pub requires_replace: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Adds the computed `id` attribute every resource carries
    pub fn with_id(self, description: &str) -> Self {
        self.attribute(
            AttributeSchema::new("id", AttributeType::String)
                .computed()
                .with_description(description),
        )
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| a.sensitive)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| a.computed)
    }

    pub fn requires_replace(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| a.requires_replace)
    }

    /// Attribute names in a stable order (for display)
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate configured attributes
    pub fn validate(&self, attributes: &Attributes) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        let mut names = self.attribute_names();
        names.retain(|n| self.attributes[*n].required);
        for name in names {
            if !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired {
                    name: name.to_string(),
                });
            }
        }

        let mut configured: Vec<&String> = attributes.keys().collect();
        configured.sort();
        for name in configured {
            let value = &attributes[name];
            match self.attributes.get(name) {
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
                Some(schema) if schema.computed && !schema.required => {
                    errors.push(TypeError::ComputedAttribute { name: name.clone() })
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(TypeError::AttributeError {
                            name: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;

    static AWS_ACCOUNT_ID: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([0-9]{12})$").expect("valid regex"));
    static AZURE_GUID: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[0-9a-z-]{36}$").expect("valid regex"));
    static GCP_PROJECT_ID: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{4,28}[a-z0-9]$").expect("valid regex"));

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Map of strings
    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// 12-digit AWS account ID
    pub fn aws_account_id() -> AttributeType {
        AttributeType::Custom {
            name: "AwsAccountId".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if AWS_ACCOUNT_ID.is_match(s) => Ok(()),
                _ => Err("The cloud account ID must be a 12-digit number.".to_string()),
            },
        }
    }

    /// Azure tenant ID
    pub fn azure_tenant_id() -> AttributeType {
        azure_guid(
            "AzureTenantId",
            |value| match value {
                Value::String(s) if AZURE_GUID.is_match(s) => Ok(()),
                _ => Err("Azure tenant ID must be a 36-character string with lowercase letters, numbers, and hyphens.".to_string()),
            },
        )
    }

    /// Azure application (client) ID
    pub fn azure_client_id() -> AttributeType {
        azure_guid(
            "AzureClientId",
            |value| match value {
                Value::String(s) if AZURE_GUID.is_match(s) => Ok(()),
                _ => Err("Client ID must be a 36-character string with lowercase letters, numbers, and hyphens.".to_string()),
            },
        )
    }

    /// Azure subscription ID
    pub fn azure_subscription_id() -> AttributeType {
        azure_guid(
            "AzureSubscriptionId",
            |value| match value {
                Value::String(s) if AZURE_GUID.is_match(s) => Ok(()),
                _ => Err("Subscription ID must be a 36-character string with lowercase letters, numbers, and hyphens.".to_string()),
            },
        )
    }

    fn azure_guid(name: &str, validate: fn(&Value) -> Result<(), String>) -> AttributeType {
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(AttributeType::String),
            validate,
        }
    }

    /// GCP project ID
    pub fn gcp_project_id() -> AttributeType {
        AttributeType::Custom {
            name: "GcpProjectId".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if GCP_PROJECT_ID.is_match(s) => Ok(()),
                _ => Err("The cloud account ID must be a valid GCP project ID.".to_string()),
            },
        }
    }
}
