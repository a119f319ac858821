//! aws_cost_ack - Registers the Cost and Usage Report bucket of an AWS account

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};

const COST_ACK_PATH: &str = "/api/v1/collection/cost/cft";

const FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions template_url external_id \
     lightlytics_collection_token account_auth_token cost { status role_arn external_id bucket_arn cur_prefix }";

#[derive(Debug, Deserialize)]
struct AwsCostAckInput {
    cloud_account_id: String,
    role_arn: String,
    external_id: String,
    bucket_arn: String,
    cur_prefix: String,
}

#[derive(Debug, Serialize)]
struct CostRequestBody<'a> {
    operation: &'a str,
    template_version: u32,
    status: &'a str,
    details: &'a str,
    role_arn: &'a str,
    bucket_arn: &'a str,
    cur_prefix: &'a str,
    external_id: &'a str,
}

impl<'a> CostRequestBody<'a> {
    fn new(operation: &'a str, input: &'a AwsCostAckInput) -> Self {
        Self {
            operation,
            template_version: 1,
            status: "success",
            details: "",
            role_arn: &input.role_arn,
            bucket_arn: &input.bucket_arn,
            cur_prefix: &input.cur_prefix,
            external_id: &input.external_id,
        }
    }
}

pub struct AwsCostAck;

async fn send(
    client: &ApiClient,
    operation: &str,
    input: &AwsCostAckInput,
    collection_token: &str,
) -> ProviderResult<()> {
    let body = serde_json::to_value(CostRequestBody::new(operation, input))
        .map_err(|e| ProviderError::new("Unable to encode cost acknowledgement").with_cause(e))?;
    client
        .acknowledge(
            Method::POST,
            COST_ACK_PATH,
            AckAuth::CollectionToken(collection_token),
            Some(&body),
        )
        .await
        .map_err(api_error("Unable to acknowledge cost collection"))
}

#[async_trait]
impl ResourceHandler for AwsCostAck {
    fn type_name(&self) -> &'static str {
        "aws_cost_ack"
    }

    fn schema(&self) -> ResourceSchema {
        let replace = |name: &str, description: &str| {
            AttributeSchema::new(name, AttributeType::String)
                .required()
                .requires_replace()
                .with_description(description)
        };
        ResourceSchema::new(self.type_name())
            .with_description("Enables cost collection from a CUR bucket")
            .with_id("The internal ID of the account.")
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
            )
            .attribute(replace("role_arn", "The role_arn to access CUR bucket."))
            .attribute(replace("external_id", "The external ID."))
            .attribute(replace("bucket_arn", "The bucket arn."))
            .attribute(replace("cur_prefix", "The CUR prefix."))
            .attribute(
                AttributeSchema::new("streamsec_collection_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The collection token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "cloud_account_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AwsCostAckInput = decode(resource)?;
        let account = client
            .find_account(FIELDS, &input.cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(&input.cloud_account_id))?;
        let token = account.collection_token.clone().unwrap_or_default();

        send(client, "Create", &input, &token).await?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("streamsec_collection_token", Some(token))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let cloud_account_id = state_str(current, "cloud_account_id")?;
        let account = client
            .find_account(FIELDS, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(cloud_account_id))?;

        let cost = account.cost.unwrap_or_default();
        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("streamsec_collection_token", account.collection_token)
                .string("role_arn", cost.role_arn)
                .string("external_id", cost.external_id)
                .string("bucket_arn", cost.bucket_arn)
                .string("cur_prefix", cost.cur_prefix)
                .into_state(current.id.clone()),
        ))
    }

    /// Every input forces replacement, so there is nothing to send
    async fn update(&self, _client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        let input = AwsCostAckInput {
            cloud_account_id: state_str(current, "cloud_account_id")?.to_string(),
            role_arn: state_str(current, "role_arn")?.to_string(),
            external_id: state_str(current, "external_id")?.to_string(),
            bucket_arn: state_str(current, "bucket_arn")?.to_string(),
            cur_prefix: state_str(current, "cur_prefix")?.to_string(),
        };
        let token = current.get_str("streamsec_collection_token").unwrap_or_default();
        send(client, "Delete", &input, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts};
    use mockito::Matcher;
    use serde_json::json;
    use streamsec_core::resource::{ResourceId, Value};

    fn desired() -> Resource {
        let mut resource = Resource::new("aws_cost_ack", "prod");
        for (k, v) in [
            ("cloud_account_id", "123456789012"),
            ("role_arn", "arn:aws:iam::123456789012:role/cur-reader"),
            ("external_id", "ext-1"),
            ("bucket_arn", "arn:aws:s3:::cur-bucket"),
            ("cur_prefix", "reports/"),
        ] {
            resource = resource.with_attribute(k, Value::String(v.to_string()));
        }
        resource
    }

    #[tokio::test]
    async fn create_posts_cost_template() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "64f0c1", "cloud_account_id": "123456789012", "lightlytics_collection_token": "collect-1"}]),
        )
        .await;
        let ack = server
            .mock("POST", COST_ACK_PATH)
            .match_header("x-lightlytics-token", "collect-1")
            .match_body(Matcher::Json(json!({
                "operation": "Create",
                "template_version": 1,
                "status": "success",
                "details": "",
                "role_arn": "arn:aws:iam::123456789012:role/cur-reader",
                "bucket_arn": "arn:aws:s3:::cur-bucket",
                "cur_prefix": "reports/",
                "external_id": "ext-1"
            })))
            .with_status(200)
            .create_async()
            .await;

        let state = AwsCostAck.create(&client(&server), &desired()).await.unwrap();
        ack.assert_async().await;
        assert_eq!(state.get_str("streamsec_collection_token"), Some("collect-1"));
    }

    #[tokio::test]
    async fn create_surfaces_rejected_ack() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "64f0c1", "cloud_account_id": "123456789012", "lightlytics_collection_token": "collect-1"}]),
        )
        .await;
        server
            .mock("POST", COST_ACK_PATH)
            .with_status(403)
            .create_async()
            .await;

        let err = AwsCostAck.create(&client(&server), &desired()).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn delete_posts_delete_operation() {
        let mut server = mockito::Server::new_async().await;
        let ack = server
            .mock("POST", COST_ACK_PATH)
            .match_body(Matcher::PartialJson(json!({"operation": "Delete"})))
            .with_status(200)
            .create_async()
            .await;

        let current = StateAttributes::from_resource(&desired())
            .string("id", Some("64f0c1"))
            .string("streamsec_collection_token", Some("collect-1"))
            .into_state(ResourceId::new("aws_cost_ack", "prod"));
        AwsCostAck.delete(&client(&server), &current).await.unwrap();
        ack.assert_async().await;
    }
}
