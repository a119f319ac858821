//! azure_tenant - An Azure tenant onboarded through the portal flow

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{delete_account, update_account};
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, api_error, decode, deleting, state_str};
use crate::models::Account;

const CREATE_AZURE_ACCOUNT: &str = r#"
    mutation CreateAzurePortalAccount($account_type: CloudProvider!, $display_name: String!) {
        createAccount(account: {
            account_type: $account_type,
            display_name: $display_name,
        }) {
            _id
            template_url
            external_id
            account_token
        }
    }"#;

const FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions template_url \
     external_id lightlytics_collection_token account_token status";

#[derive(Debug, Deserialize)]
struct AzureTenantInput {
    display_name: String,
}

pub struct AzureTenant;

fn tenant_not_found(id: &str) -> ProviderError {
    ProviderError::new(format!(
        "Unable to get tenant, tenant with id: {} not found in Stream.Security API.",
        id
    ))
}

#[async_trait]
impl ResourceHandler for AzureTenant {
    fn type_name(&self) -> &'static str {
        "azure_tenant"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("An Azure tenant connected to Stream.Security")
            .with_id("The ID of the account.")
            .attribute(
                AttributeSchema::new("display_name", AttributeType::String)
                    .required()
                    .with_description("The display name of the account."),
            )
            .attribute(
                AttributeSchema::new("template_url", AttributeType::String)
                    .computed()
                    .with_description("The template URL."),
            )
            .attribute(
                AttributeSchema::new("account_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The account token."),
            )
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AzureTenantInput = decode(resource)?;
        let variables = json!({
            "account_type": "Azure",
            "display_name": input.display_name,
        });

        let account: Account = client
            .mutate(CREATE_AZURE_ACCOUNT, &variables, "createAccount")
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("template_url", account.template_url)
            .string("account_token", account.account_token)
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let id = state_str(current, "id")?;
        let account = client
            .find_account_by_id(FIELDS, id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| tenant_not_found(id))?;
        if account.is_deleting() {
            return Err(deleting("Azure tenant", id));
        }

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("display_name", account.display_name)
                .string("template_url", account.template_url)
                .string("account_token", account.account_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: AzureTenantInput = decode(to)?;
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
