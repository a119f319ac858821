//! Provider configuration
//!
//! Every setting may come from the `provider` block of the configuration file
//! or from a `STREAMSEC_*` environment variable. A configured value wins.

use std::fmt;

use streamsec_core::resource::{Attributes, Value};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// One provider setting: attribute name, display name, environment variable
struct Setting {
    attribute: &'static str,
    label: &'static str,
    env: &'static str,
}

const HOST: Setting = Setting {
    attribute: "host",
    label: "Host",
    env: "STREAMSEC_HOST",
};
const USERNAME: Setting = Setting {
    attribute: "username",
    label: "Username",
    env: "STREAMSEC_USERNAME",
};
const PASSWORD: Setting = Setting {
    attribute: "password",
    label: "Password",
    env: "STREAMSEC_PASSWORD",
};
const WORKSPACE_ID: Setting = Setting {
    attribute: "workspace_id",
    label: "Workspace ID",
    env: "STREAMSEC_WORKSPACE_ID",
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Missing(Vec<MissingSetting>),

    #[error("Provider attribute '{0}' must be a string")]
    NotAString(String),
}

/// A setting that was neither configured nor present in the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSetting {
    pub attribute: &'static str,
    pub label: &'static str,
    pub env: &'static str,
}

impl fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Missing Stream.Security API {label}: the provider cannot create the Stream.Security API client \
             as there is a missing or empty value for the Stream.Security API {lower}. \
             Set the {attr} value in the configuration or use the {env} environment variable. \
             If either is already set, ensure the value is not empty.",
            label = self.label,
            lower = self.label.to_lowercase(),
            attr = self.attribute,
            env = self.env,
        )
    }
}

/// Resolved connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub workspace_id: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"(sensitive)")
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve settings against the process environment
    pub fn from_attributes(attributes: &Attributes) -> Result<Self, ConfigError> {
        Self::resolve(attributes, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an explicit environment lookup
    ///
    /// Every missing setting is reported in a single error.
    pub fn resolve<F>(attributes: &Attributes, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut lookup = |setting: &Setting| -> Result<String, ConfigError> {
            let configured = match attributes.get(setting.attribute) {
                None => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => return Err(ConfigError::NotAString(setting.attribute.to_string())),
            };
            let value = configured.or_else(|| env(setting.env)).unwrap_or_default();
            if value.is_empty() {
                missing.push(MissingSetting {
                    attribute: setting.attribute,
                    label: setting.label,
                    env: setting.env,
                });
            }
            Ok(value)
        };

        let host = lookup(&HOST)?;
        let username = lookup(&USERNAME)?;
        let password = lookup(&PASSWORD)?;
        let workspace_id = lookup(&WORKSPACE_ID)?;

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            host,
            username,
            password,
            workspace_id,
        })
    }

    /// Base URL of the API; bare hosts are reached over https
    pub fn base_url(&self) -> String {
        base_url(&self.host)
    }
}

pub(crate) fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Schema of the `provider` block
///
/// Nothing is required here since each setting may come from the environment.
pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("streamsec")
        .with_description("Stream.Security API connection")
        .attribute(
            AttributeSchema::new("host", AttributeType::String)
                .with_description("API host, e.g. acme.streamsec.io. Env: STREAMSEC_HOST"),
        )
        .attribute(
            AttributeSchema::new("username", AttributeType::String)
                .with_description("Login email. Env: STREAMSEC_USERNAME"),
        )
        .attribute(
            AttributeSchema::new("password", AttributeType::String)
                .sensitive()
                .with_description("Login password. Env: STREAMSEC_PASSWORD"),
        )
        .attribute(
            AttributeSchema::new("workspace_id", AttributeType::String)
                .with_description("Workspace to log into. Env: STREAMSEC_WORKSPACE_ID"),
        )
}
