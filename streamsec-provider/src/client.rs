//! Stream.Security API client
//!
//! One GraphQL endpoint (`POST {base}/graphql`) carries account management.
//! Cloud-side acknowledgements go to plain REST endpoints authenticated with
//! the per-account token the GraphQL API hands out.

use std::time::Duration;

use log::{debug, trace};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{ProviderConfig, base_url};
use crate::models::Account;

const USER_AGENT: &str = concat!("streamsec-provider/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Variable names whose values never reach the log
const SECRET_KEYS: &[&str] = &[
    "password",
    "client_secret",
    "private_key",
    "access_token",
    "account_auth_token",
    "account_token",
];

const LOGIN_MUTATION: &str = r#"
    mutation Login($credentials: Credentials) {
        login(credentials: $credentials) {
            access_token
        }
    }"#;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Error while making the HTTP request - {0}")]
    Http(#[from] reqwest::Error),

    #[error("The API returned status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("{0}")]
    GraphQL(String),

    #[error("The API response has no '{0}' field")]
    MissingField(String),

    #[error("Unable to decode '{field}' from the API response - {source}")]
    Decode {
        field: String,
        source: serde_json::Error,
    },

    #[error("Login failed: {0}")]
    Login(Box<ClientError>),
}

/// How a REST acknowledgement authenticates
#[derive(Debug, Clone, Copy)]
pub enum AckAuth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
    /// `X-Lightlytics-Token: <token>`, used by the collection endpoints
    CollectionToken(&'a str),
}

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Log in and return a client carrying the session token
    pub async fn connect(config: &ProviderConfig) -> Result<Self, ClientError> {
        let mut client = Self::with_token(config.base_url(), "")?;
        let variables = json!({
            "credentials": {
                "email": config.username,
                "password": config.password,
                "workspace_id": config.workspace_id,
            }
        });

        debug!("Logging into {} as {}", client.base_url, config.username);
        let token: String = client
            .send(LOGIN_MUTATION, Some(&variables), None)
            .await
            .and_then(|data| extract(&data, &["login", "access_token"]))
            .map_err(|e| ClientError::Login(Box::new(e)))?;

        client.token = token;
        Ok(client)
    }

    /// Build a client around an existing session token
    pub fn with_token(base: impl AsRef<str>, token: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url(base.as_ref()),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a query or mutation with the session token and return its `data`
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ClientError> {
        self.send(query, variables, Some(&self.token)).await
    }

    /// Run a query or mutation authenticated with an account token
    pub async fn graphql_with_token(
        &self,
        query: &str,
        variables: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.send(query, variables, Some(token)).await
    }

    /// Run a mutation and decode the named top-level field of its result
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &serde_json::Value,
        field: &str,
    ) -> Result<T, ClientError> {
        let data = self.graphql(query, Some(variables)).await?;
        extract(&data, &[field])
    }

    /// Every account in the workspace, with the requested fields
    pub async fn list_accounts(&self, fields: &str) -> Result<Vec<Account>, ClientError> {
        let query = format!("query {{ accounts {{ {} }} }}", fields);
        let data = self.graphql(&query, None).await?;
        match data.get("accounts") {
            Some(serde_json::Value::Null) | None => Ok(Vec::new()),
            Some(_) => extract(&data, &["accounts"]),
        }
    }

    /// The account whose `cloud_account_id` matches
    pub async fn find_account(
        &self,
        fields: &str,
        cloud_account_id: &str,
    ) -> Result<Option<Account>, ClientError> {
        Ok(self
            .list_accounts(fields)
            .await?
            .into_iter()
            .find(|a| a.cloud_account_id.as_deref() == Some(cloud_account_id)))
    }

    /// The account with the given internal `_id`
    pub async fn find_account_by_id(
        &self,
        fields: &str,
        id: &str,
    ) -> Result<Option<Account>, ClientError> {
        Ok(self
            .list_accounts(fields)
            .await?
            .into_iter()
            .find(|a| a.id == id))
    }

    /// Send a REST acknowledgement; anything but 200 is an error
    pub async fn acknowledge(
        &self,
        method: Method,
        path: &str,
        auth: AckAuth<'_>,
        body: Option<&serde_json::Value>,
    ) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        request = match auth {
            AckAuth::Bearer(token) => request.bearer_auth(token),
            AckAuth::CollectionToken(token) => request.header("X-Lightlytics-Token", token),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{} {}", method, url);
        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus { status, body });
        }
        trace!("{} {} -> {}", method, url, status);
        Ok(())
    }

    async fn send(
        &self,
        query: &str,
        variables: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        let url = format!("{}/graphql", self.base_url);
        if let Some(variables) = variables {
            debug!("GraphQL variables: {}", redact(variables));
        }

        let mut request = self.http.post(&url).json(&GraphQLRequest { query, variables });
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus { status, body });
        }

        let body: GraphQLResponse = response.json().await?;
        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::GraphQL(messages.join("; ")));
        }
        trace!("GraphQL request to {} succeeded", url);
        body.data
            .ok_or_else(|| ClientError::MissingField("data".to_string()))
    }
}

/// Decode the value found by following `path` through nested objects
fn extract<T: DeserializeOwned>(data: &serde_json::Value, path: &[&str]) -> Result<T, ClientError> {
    let mut current = data;
    for key in path {
        current = current
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ClientError::MissingField(path.join(".")))?;
    }
    serde_json::from_value(current.clone()).map_err(|source| ClientError::Decode {
        field: path.join("."),
        source,
    })
}

/// Copy of `value` with secret fields masked, for logging
fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if SECRET_KEYS.contains(&k.as_str()) {
                        (k.clone(), json!("(sensitive)"))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(host: String) -> ProviderConfig {
        ProviderConfig {
            host,
            username: "ops@acme.io".to_string(),
            password: "hunter2".to_string(),
            workspace_id: "ws-1".to_string(),
        }
    }

    #[tokio::test]
    async fn connect_logs_in_and_uses_session_token() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "variables": {
                    "credentials": {
                        "email": "ops@acme.io",
                        "password": "hunter2",
                        "workspace_id": "ws-1"
                    }
                }
            })))
            .with_status(200)
            .with_body(r#"{"data": {"login": {"access_token": "session-token"}}}"#)
            .create_async()
            .await;
        let accounts = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer session-token")
            .match_body(Matcher::Regex("accounts".to_string()))
            .with_status(200)
            .with_body(r#"{"data": {"accounts": [{"_id": "a1", "cloud_account_id": "123456789012"}]}}"#)
            .create_async()
            .await;

        let client = ApiClient::connect(&config(server.url())).await.unwrap();
        let found = client
            .find_account("_id cloud_account_id", "123456789012")
            .await
            .unwrap();

        assert_eq!(found.map(|a| a.id), Some("a1".to_string()));
        login.assert_async().await;
        accounts.assert_async().await;
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": null, "errors": [{"message": "Invalid credentials"}]}"#)
            .create_async()
            .await;

        let err = ApiClient::connect(&config(server.url())).await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed: Invalid credentials");
    }

    #[tokio::test]
    async fn graphql_errors_are_joined() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                r#"{"errors": [{"message": "Account already exists"}, {"message": "Try again"}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "t").unwrap();
        let err = client.graphql("mutation { noop }", None).await.unwrap_err();
        assert!(matches!(&err, ClientError::GraphQL(_)));
        assert_eq!(err.to_string(), "Account already exists; Try again");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "t").unwrap();
        let err = client.graphql("query { accounts { _id } }", None).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_GATEWAY
        ));
    }

    #[tokio::test]
    async fn graphql_with_token_overrides_session() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer account-token")
            .with_status(200)
            .with_body(r#"{"data": {"accountAcknowledge": true}}"#)
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "session-token").unwrap();
        let data = client
            .graphql_with_token("mutation { accountAcknowledge }", None, "account-token")
            .await
            .unwrap();
        assert_eq!(data["accountAcknowledge"], json!(true));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn acknowledge_sends_collection_token() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/collection/cost/cft")
            .match_header("x-lightlytics-token", "collect-1")
            .match_body(Matcher::PartialJson(json!({"operation": "Create"})))
            .with_status(200)
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "session-token").unwrap();
        client
            .acknowledge(
                Method::POST,
                "/api/v1/collection/cost/cft",
                AckAuth::CollectionToken("collect-1"),
                Some(&json!({"operation": "Create"})),
            )
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn acknowledge_rejects_other_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/accounts/accounts/remediation/123456789012")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "session-token").unwrap();
        let err = client
            .acknowledge(
                Method::DELETE,
                "/api/accounts/accounts/remediation/123456789012",
                AckAuth::Bearer("collect-1"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status, .. } if status == StatusCode::NO_CONTENT
        ));
    }

    #[tokio::test]
    async fn null_accounts_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"accounts": null}}"#)
            .create_async()
            .await;

        let client = ApiClient::with_token(server.url(), "t").unwrap();
        assert!(client.list_accounts("_id").await.unwrap().is_empty());
    }

    #[test]
    fn redact_masks_nested_secrets() {
        let redacted = redact(&json!({
            "credentials": {"email": "ops@acme.io", "password": "hunter2"},
            "account": {"private_key": "-----BEGIN", "client_email": "sa@proj.iam"}
        }));
        assert_eq!(redacted["credentials"]["password"], json!("(sensitive)"));
        assert_eq!(redacted["credentials"]["email"], json!("ops@acme.io"));
        assert_eq!(redacted["account"]["private_key"], json!("(sensitive)"));
    }

    #[test]
    fn extract_reports_missing_path() {
        let data = json!({"login": null});
        let err = extract::<String>(&data, &["login", "access_token"]).unwrap_err();
        assert_eq!(err.to_string(), "The API response has no 'login.access_token' field");
    }
}
