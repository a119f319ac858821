//! gcp_project - A GCP project onboarded to Stream.Security

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{delete_account, update_account};
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, api_error, decode, deleting, state_str};
use crate::models::Account;

const CREATE_GCP_ACCOUNT: &str = r#"
    mutation CreateAccount($account_type: CloudProvider!, $cloud_account_id: String!, $display_name: String) {
        createAccount(account: {
            account_type: $account_type,
            cloud_account_id: $cloud_account_id,
            display_name: $display_name,
        }) {
            _id
            account_token
        }
    }"#;

pub(crate) const PROJECT_FIELDS: &str = "_id account_type cloud_account_id display_name account_token status";

#[derive(Debug, Deserialize)]
struct GcpProjectInput {
    display_name: String,
    project_id: String,
}

pub(crate) fn project_not_found(project_id: &str) -> ProviderError {
    ProviderError::new(format!(
        "Unable to get account, GCP project with cloud_account_id: {} not found in Stream.Security API.",
        project_id
    ))
}

pub struct GcpProject;

#[async_trait]
impl ResourceHandler for GcpProject {
    fn type_name(&self) -> &'static str {
        "gcp_project"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("A GCP project connected to Stream.Security")
            .with_id("The ID of the account.")
            .attribute(
                AttributeSchema::new("display_name", AttributeType::String)
                    .required()
                    .with_description("The display name of the account."),
            )
            .attribute(
                AttributeSchema::new("project_id", types::gcp_project_id())
                    .required()
                    .requires_replace()
                    .with_description("The GCP Project ID."),
            )
            .attribute(
                AttributeSchema::new("account_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The account token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "project_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: GcpProjectInput = decode(resource)?;
        let variables = json!({
            "account_type": "GCP",
            "cloud_account_id": input.project_id,
            "display_name": input.display_name,
        });

        let account: Account = client
            .mutate(CREATE_GCP_ACCOUNT, &variables, "createAccount")
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("account_token", account.account_token)
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let project_id = state_str(current, "project_id")?;
        let account = client
            .find_account(PROJECT_FIELDS, project_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| project_not_found(project_id))?;
        if account.is_deleting() {
            return Err(deleting("GCP project", project_id));
        }

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("display_name", account.display_name)
                .string("account_token", account.account_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: GcpProjectInput = decode(to)?;
        if from.get_str("display_name") != Some(input.display_name.as_str()) {
            update_account(
                client,
                state_str(from, "id")?,
                json!({ "display_name": input.display_name }),
            )
            .await?;
        }
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        delete_account(client, state_str(current, "id")?).await
    }
}
