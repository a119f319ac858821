//! aws_account_ack - Tells Stream.Security the onboarding stack of an AWS
//! account is deployed and which role to assume

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::aws_account::ACCOUNT_FIELDS;
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};
use crate::models::Account;

const ACCOUNT_ACKNOWLEDGE: &str = r#"
    mutation AccountAcknowledge($input: AccountAckInput) {
        accountAcknowledge(account: $input)
    }"#;

const ACCOUNT_UPDATE_ACKNOWLEDGE: &str = r#"
    mutation accountUpdateAcknowledge($account: AccountUpdateAckInput) {
        accountUpdateAcknowledge(account: $account)
    }"#;

#[derive(Debug, Deserialize)]
struct AwsAccountAckInput {
    role_arn: String,
    cloud_account_id: String,
    stack_region: String,
}

pub struct AwsAccountAck;

impl AwsAccountAck {
    async fn find(&self, client: &ApiClient, cloud_account_id: &str) -> ProviderResult<Account> {
        client
            .find_account(ACCOUNT_FIELDS, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(cloud_account_id))
    }
}

fn auth_token(account: &Account) -> ProviderResult<&str> {
    account
        .account_auth_token
        .as_deref()
        .ok_or_else(|| ProviderError::new(format!("Account {} has no account_auth_token", account.id)))
}

#[async_trait]
impl ResourceHandler for AwsAccountAck {
    fn type_name(&self) -> &'static str {
        "aws_account_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Acknowledges that an AWS account's integration stack is deployed")
            .with_id("The internal ID of the account.")
            .attribute(
                AttributeSchema::new("role_arn", AttributeType::String)
                    .required()
                    .with_description("The role that gives permissions to Stream.Security."),
            )
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
            )
            .attribute(
                AttributeSchema::new("stack_region", AttributeType::String)
                    .required()
                    .with_description("The stack region."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "cloud_account_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AwsAccountAckInput = decode(resource)?;
        let account = self.find(client, &input.cloud_account_id).await?;

        let variables = json!({
            "input": {
                "lightlytics_internal_account_id": account.id,
                "role_arn": input.role_arn,
                "account_type": "AWS",
                "account_aliases": "",
                "cloud_account_id": input.cloud_account_id,
                "stack_region": input.stack_region,
                "stack_id": "",
                "init_stack_version": 1,
            }
        });
        client
            .graphql_with_token(ACCOUNT_ACKNOWLEDGE, Some(&variables), auth_token(&account)?)
            .await
            .map_err(api_error("Unable to send account acknowledge"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let cloud_account_id = state_str(current, "cloud_account_id")?;
        let fields = format!("{} role_arn", ACCOUNT_FIELDS);
        let Some(account) = client
            .find_account(&fields, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            return Ok(None);
        };

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("cloud_account_id", account.cloud_account_id)
                .string("stack_region", account.stack_region)
                .string("role_arn", account.role_arn)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: AwsAccountAckInput = decode(to)?;
        let account = self.find(client, &input.cloud_account_id).await?;

        if from.get_str("role_arn") != Some(input.role_arn.as_str()) {
            let variables = json!({
                "account": {
                    "lightlytics_internal_account_id": account.id,
                    "account_type": "AWS",
                    "role_arn": input.role_arn,
                    "init_stack_version": 1,
                }
            });
            client
                .graphql_with_token(ACCOUNT_UPDATE_ACKNOWLEDGE, Some(&variables), auth_token(&account)?)
                .await
                .map_err(api_error("Unable to update account"))?;
        }

        Ok(StateAttributes::carry_over(from, to)
            .string("id", Some(account.id))
            .into_state(to.id.clone()))
    }

    /// The API has no way to withdraw an acknowledgement
    async fn delete(&self, _client: &ApiClient, _current: &State) -> ProviderResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts};
    use mockito::Matcher;
    use streamsec_core::resource::{ResourceId, Value};

    fn desired(role_arn: &str) -> Resource {
        Resource::new("aws_account_ack", "prod")
            .with_attribute("role_arn", Value::String(role_arn.to_string()))
            .with_attribute("cloud_account_id", Value::String("123456789012".to_string()))
            .with_attribute("stack_region", Value::String("us-east-1".to_string()))
    }

    fn account() -> serde_json::Value {
        json!([{
            "_id": "64f0c1",
            "cloud_account_id": "123456789012",
            "stack_region": "us-east-1",
            "account_auth_token": "auth-1",
            "role_arn": "arn:aws:iam::123456789012:role/streamsec"
        }])
    }

    #[tokio::test]
    async fn create_acknowledges_with_account_token() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, account()).await;
        let ack = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer auth-1")
            .match_body(Matcher::PartialJson(json!({
                "variables": {"input": {
                    "lightlytics_internal_account_id": "64f0c1",
                    "account_type": "AWS",
                    "init_stack_version": 1
                }}
            })))
            .with_status(200)
            .with_body(r#"{"data": {"accountAcknowledge": true}}"#)
            .create_async()
            .await;

        let state = AwsAccountAck
            .create(&client(&server), &desired("arn:aws:iam::123456789012:role/streamsec"))
            .await
            .unwrap();
        ack.assert_async().await;
        assert_eq!(state.identifier.as_deref(), Some("64f0c1"));
    }

    #[tokio::test]
    async fn create_fails_without_account() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([])).await;

        let err = AwsAccountAck
            .create(&client(&server), &desired("arn:aws:iam::123456789012:role/streamsec"))
            .await
            .unwrap_err();
        assert!(err.message.starts_with("Unable to get account"));
    }

    #[tokio::test]
    async fn read_missing_account_removes_from_state() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([])).await;

        let current = AwsAccountAck
            .import_state(ResourceId::new("aws_account_ack", "prod"), "123456789012")
            .unwrap();
        let read = AwsAccountAck.read(&client(&server), &current).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn update_reacknowledges_new_role() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, account()).await;
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("accountUpdateAcknowledge".to_string()))
            .with_status(200)
            .with_body(r#"{"data": {"accountUpdateAcknowledge": true}}"#)
            .create_async()
            .await;

        let from = StateAttributes::from_resource(&desired("arn:aws:iam::123456789012:role/old"))
            .string("id", Some("64f0c1"))
            .into_state(ResourceId::new("aws_account_ack", "prod"));
        AwsAccountAck
            .update(&client(&server), &from, &desired("arn:aws:iam::123456789012:role/new"))
            .await
            .unwrap();
        update.assert_async().await;
    }
}
