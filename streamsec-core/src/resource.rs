//! Declared resources, fetched state and the values both carry

use std::collections::HashMap;

/// Attribute map shared by desired resources and fetched state
pub type Attributes = HashMap<String, Value>;

/// `type.name` of a declared block
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "aws_account", "gcp_project_ack")
    pub resource_type: String,
    /// Resource name (identifier given in the configuration file)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    /// Non-integral number; only stored state carries these
    Float(f64),
    /// `null` kept from stored state
    Null,
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding, attribute_name)
    ///
    /// The binding is `type.name` of the referenced resource.
    ResourceRef(String, String),
}

impl Value {
    /// Borrow the inner string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a reference written as `${type.name.attribute}`
    ///
    /// Returns `None` for any other string.
    pub fn parse_reference(s: &str) -> Option<Value> {
        let inner = s.strip_prefix("${")?.strip_suffix('}')?;
        let (binding, attribute) = inner.rsplit_once('.')?;
        if !binding.contains('.') || attribute.is_empty() {
            return None;
        }
        Some(Value::ResourceRef(binding.to_string(), attribute.to_string()))
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Null => "Null".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
        }
    }
}

/// Desired state declared in the configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: Attributes,
    /// Set for data sources, which are only ever read
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    /// Binding name other resources use to reference this one
    pub fn binding(&self) -> String {
        self.id.to_string()
    }
}

/// Current state fetched from the Stream.Security API
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Stream.Security internal identifier (the `_id` of the account)
    pub identifier: Option<String>,
    pub attributes: Attributes,
    /// False once the remote object is gone
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: Attributes) -> Self {
        let identifier = attributes
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id,
            identifier,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Get a string attribute
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}
