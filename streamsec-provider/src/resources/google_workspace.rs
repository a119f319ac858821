//! google_workspace - A Google Workspace customer onboarded with a service account

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::provider::ProviderResult;
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{delete_account, update_account};
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, api_error, decode, deleting, state_str};
use crate::models::Account;

const CREATE_WORKSPACE_ACCOUNT: &str = r#"
    mutation CreateAccount($account_type: CloudProvider!, $cloud_account_id: String!, $display_name: String, $client_email: String, $private_key: String) {
        createAccount(account: {
            account_type: $account_type,
            cloud_account_id: $cloud_account_id,
            display_name: $display_name,
            client_email: $client_email,
            private_key: $private_key,
        }) {
            _id
            account_token
        }
    }"#;

const FIELDS: &str = "_id account_type cloud_account_id display_name account_token status";

#[derive(Debug, Deserialize)]
struct GoogleWorkspaceInput {
    display_name: String,
    customer_id: String,
    client_email: String,
    private_key: String,
}

pub struct GoogleWorkspace;

#[async_trait]
impl ResourceHandler for GoogleWorkspace {
    fn type_name(&self) -> &'static str {
        "google_workspace"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("A Google Workspace connected to Stream.Security")
            .with_id("The ID of the account.")
            .attribute(
                AttributeSchema::new("display_name", AttributeType::String)
                    .required()
                    .with_description("The display name of the account."),
            )
            .attribute(
                AttributeSchema::new("customer_id", AttributeType::String)
                    .required()
                    .requires_replace()
                    .with_description("The Google Workspace Customer ID."),
            )
            .attribute(
                AttributeSchema::new("client_email", AttributeType::String)
                    .required()
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
                    .with_description("The account token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "customer_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: GoogleWorkspaceInput = decode(resource)?;
        let variables = json!({
            "account_type": "GOOGLE_WORKSPACE",
            "cloud_account_id": input.customer_id,
            "display_name": input.display_name,
            "client_email": input.client_email,
            "private_key": input.private_key,
        });

        let account: Account = client
            .mutate(CREATE_WORKSPACE_ACCOUNT, &variables, "createAccount")
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("account_token", account.account_token)
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let customer_id = state_str(current, "customer_id")?;
        let Some(account) = client
            .find_account(FIELDS, customer_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            debug!("Google workspace {} is gone", customer_id);
            return Ok(None);
        };
        if account.is_deleting() {
            return Err(deleting("Google workspace", customer_id));
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
        let input: GoogleWorkspaceInput = decode(to)?;
        let changed = ["display_name", "client_email", "private_key"]
            .iter()
            .any(|key| from.get_str(key) != to.attributes.get(*key).and_then(|v| v.as_str()));

        if changed {
            update_account(
                client,
                state_str(from, "id")?,
                json!({
                    "display_name": input.display_name,
                    "client_email": input.client_email,
                    "private_key": input.private_key,
                }),
            )
            .await?;
        }
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        delete_account(client, state_str(current, "id")?).await
    }
}
