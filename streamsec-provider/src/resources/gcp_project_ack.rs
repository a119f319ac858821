//! gcp_project_ack - Hands Stream.Security the service account of a GCP project

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::update_account;
use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};

const GCP_ACK_PATH: &str = "/gcp/account-acknowledge";

const FIELDS: &str = "_id cloud_account_id client_email account_token";

#[derive(Debug, Deserialize, Serialize)]
struct GcpProjectAckInput {
    project_id: String,
    client_email: String,
    private_key: String,
}

pub struct GcpProjectAck;

#[async_trait]
impl ResourceHandler for GcpProjectAck {
    fn type_name(&self) -> &'static str {
        "gcp_project_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Acknowledges the service account of a GCP project")
            .with_id("The internal ID of the project.")
            .attribute(
                AttributeSchema::new("project_id", AttributeType::String)
                    .required()
                    .with_description("The GCP project ID."),
            )
            .attribute(
                AttributeSchema::new("client_email", AttributeType::String)
                    .required()
                    .sensitive()
                    .with_description("The service account email."),
            )
            .attribute(
                AttributeSchema::new("private_key", AttributeType::String)
                    .required()
                    .sensitive()
                    .with_description("The service account private key."),
            )
            .attribute(
                AttributeSchema::new("account_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The collection token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "project_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: GcpProjectAckInput = decode(resource)?;
        let account = client
            .find_account(FIELDS, &input.project_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(&input.project_id))?;
        let token = account.account_token.clone().unwrap_or_default();

        let mut body = serde_json::to_value(&input)
            .map_err(|e| ProviderError::new("Unable to encode GCP acknowledgement").with_cause(e))?;
        body["account_type"] = json!("GCP");
        client
            .acknowledge(Method::POST, GCP_ACK_PATH, AckAuth::Bearer(&token), Some(&body))
            .await
            .map_err(api_error("Unable to send acknowledge to Stream Security"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("account_token", Some(token))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let project_id = state_str(current, "project_id")?;
        let account = client
            .find_account(FIELDS, project_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(project_id))?;

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("client_email", account.client_email)
                .string("account_token", account.account_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: GcpProjectAckInput = decode(to)?;
        if from.get_str("client_email") != Some(input.client_email.as_str())
            || from.get_str("private_key") != Some(input.private_key.as_str())
        {
            update_account(
                client,
                state_str(from, "id")?,
                json!({
                    "client_email": input.client_email,
                    "private_key": input.private_key,
                }),
            )
            .await?;
        }
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    /// No remote call; the ack only leaves state
    async fn delete(&self, _client: &ApiClient, _current: &State) -> ProviderResult<()> {
        Ok(())
    }
}
