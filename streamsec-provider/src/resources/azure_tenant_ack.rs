//! azure_tenant_ack - Hands Stream.Security the app registration of an Azure
//! tenant and the subscriptions to collect from

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use streamsec_core::convert::equal_lists;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::update_account;
use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};

const AZURE_ACK_PATH: &str = "/azure/account-acknowledge";

const FIELDS: &str = "_id cloud_account_id client_id subscriptions { id } account_token";

#[derive(Debug, Deserialize)]
struct AzureTenantAckInput {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    subscriptions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AzureAckRequestBody<'a> {
    account_type: &'a str,
    tenant_id: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    subscriptions: String,
}

pub struct AzureTenantAck;

#[async_trait]
impl ResourceHandler for AzureTenantAck {
    fn type_name(&self) -> &'static str {
        "azure_tenant_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Acknowledges the app registration of an Azure tenant")
            .with_id("The internal ID of the tenant.")
            .attribute(
                AttributeSchema::new("tenant_id", types::azure_tenant_id())
                    .required()
                    .with_description("The Azure tenant ID."),
            )
            .attribute(
                AttributeSchema::new("client_id", types::azure_client_id())
                    .required()
                    .with_description("The client ID."),
            )
            .attribute(
                AttributeSchema::new("client_secret", AttributeType::String)
                    .required()
                    .sensitive()
                    .with_description("The client secret."),
            )
            .attribute(
                AttributeSchema::new(
                    "subscriptions",
                    AttributeType::List(Box::new(types::azure_subscription_id())),
                )
                .required()
                .with_description("The subscriptions integrated"),
            )
            .attribute(
                AttributeSchema::new("account_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The collection token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "tenant_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AzureTenantAckInput = decode(resource)?;
        let account = client
            .find_account(FIELDS, &input.tenant_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Unable to get tenant, tenant with id: {} not found in Stream.Security API.",
                    input.tenant_id
                ))
            })?;
        let token = account.account_token.clone().unwrap_or_default();

        let body = serde_json::to_value(AzureAckRequestBody {
            account_type: "Azure",
            tenant_id: &input.tenant_id,
            client_id: &input.client_id,
            client_secret: &input.client_secret,
            subscriptions: input.subscriptions.join(","),
        })
        .map_err(|e| ProviderError::new("Unable to encode Azure acknowledgement").with_cause(e))?;
        client
            .acknowledge(Method::POST, AZURE_ACK_PATH, AckAuth::Bearer(&token), Some(&body))
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("account_token", Some(token))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let tenant_id = state_str(current, "tenant_id")?;
        let account = client
            .find_account(FIELDS, tenant_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(tenant_id))?;

        let subscriptions = account.subscription_ids();
        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("client_id", account.client_id)
                .list("subscriptions", Some(subscriptions))
                .string("account_token", account.account_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: AzureTenantAckInput = decode(to)?;
        let subscriptions_changed = match (from.attributes.get("subscriptions"), to.attributes.get("subscriptions")) {
            (Some(a), Some(b)) => !equal_lists(a, b),
            _ => true,
        };

        if subscriptions_changed
            || from.get_str("client_id") != Some(input.client_id.as_str())
            || from.get_str("client_secret") != Some(input.client_secret.as_str())
        {
            update_account(
                client,
                state_str(from, "id")?,
                json!({
                    "subscriptions": input.subscriptions,
                    "client_id": input.client_id,
                    "client_secret": input.client_secret,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts, mock_mutation};
    use mockito::Matcher;
    use streamsec_core::convert::from_string_list;
    use streamsec_core::resource::{ResourceId, Value};

    const TENANT: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
    const CLIENT: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
    const SUB_A: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";
    const SUB_B: &str = "6ba7b811-9dad-11d1-80b4-00c04fd430c8";

    fn desired(subscriptions: &[&str]) -> Resource {
        Resource::new("azure_tenant_ack", "main")
            .with_attribute("tenant_id", Value::String(TENANT.to_string()))
            .with_attribute("client_id", Value::String(CLIENT.to_string()))
            .with_attribute("client_secret", Value::String("s3cr3t".to_string()))
            .with_attribute("subscriptions", from_string_list(subscriptions.iter().copied()))
    }

    #[tokio::test]
    async fn create_joins_subscriptions() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "az-1", "cloud_account_id": TENANT, "account_token": "acct-tok"}]),
        )
        .await;
        let ack = server
            .mock("POST", AZURE_ACK_PATH)
            .match_header("authorization", "Bearer acct-tok")
            .match_body(Matcher::Json(json!({
                "account_type": "Azure",
                "tenant_id": TENANT,
                "client_id": CLIENT,
                "client_secret": "s3cr3t",
                "subscriptions": format!("{},{}", SUB_A, SUB_B)
            })))
            .with_status(200)
            .create_async()
            .await;

        let state = AzureTenantAck
            .create(&client(&server), &desired(&[SUB_A, SUB_B]))
            .await
            .unwrap();
        ack.assert_async().await;
        assert_eq!(state.get_str("account_token"), Some("acct-tok"));
    }

    #[tokio::test]
    async fn read_takes_subscriptions_from_api() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{
                "_id": "az-1",
                "cloud_account_id": TENANT,
                "client_id": CLIENT,
                "subscriptions": [{"id": SUB_B}],
                "account_token": "acct-tok"
            }]),
        )
        .await;

        let current = AzureTenantAck
            .import_state(ResourceId::new("azure_tenant_ack", "main"), TENANT)
            .unwrap();
        let state = AzureTenantAck
            .read(&client(&server), &current)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.attributes.get("subscriptions"), Some(&from_string_list([SUB_B])));
        assert_eq!(state.get_str("client_id"), Some(CLIENT));
    }

    #[tokio::test]
    async fn read_without_subscriptions_yields_empty_list() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "az-1", "cloud_account_id": TENANT, "subscriptions": null}]),
        )
        .await;

        let current = AzureTenantAck
            .import_state(ResourceId::new("azure_tenant_ack", "main"), TENANT)
            .unwrap();
        let state = AzureTenantAck
            .read(&client(&server), &current)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.attributes.get("subscriptions"), Some(&Value::List(vec![])));
    }

    #[tokio::test]
    async fn read_missing_tenant_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([])).await;

        let current = AzureTenantAck
            .import_state(ResourceId::new("azure_tenant_ack", "main"), TENANT)
            .unwrap();
        assert!(AzureTenantAck.read(&client(&server), &current).await.is_err());
    }

    #[tokio::test]
    async fn update_sends_new_subscriptions() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_mutation(&mut server, "updateAccount", json!({"updateAccount": {"_id": "az-1"}})).await;
        let from = StateAttributes::from_resource(&desired(&[SUB_A]))
            .string("id", Some("az-1"))
            .into_state(ResourceId::new("azure_tenant_ack", "main"));

        AzureTenantAck
            .update(&client(&server), &from, &desired(&[SUB_A, SUB_B]))
            .await
            .unwrap();
        m.assert_async().await;
    }
}
