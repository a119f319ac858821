//! aws_response_ack - Installs response (remediation) runbooks on an AWS account

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::delete_remediation;
use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};

const REMEDIATION_ACK_PATH: &str = "/api/accounts/accounts/remediation-acknowledge";

const FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions template_url \
     external_id lightlytics_collection_token account_auth_token \
     remediation { status role_arn stack_id runbook_list runbook_role_list policy_to_role_map external_id }";

#[derive(Debug, Deserialize)]
struct AwsResponseAckInput {
    cloud_account_id: String,
    region: String,
    role_arn: String,
    runbook_list: Vec<String>,
    runbook_role_list: Vec<String>,
    policy_to_role_map: HashMap<String, String>,
    external_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RemediationRequestBody<'a> {
    account_id: &'a str,
    region: &'a str,
    template_version: &'a str,
    external_id: &'a str,
    #[serde(rename = "RoleARN")]
    role_arn: &'a str,
    stack_id: &'a str,
    runbook_list: &'a [String],
    runbook_role_list: &'a [String],
    policy_to_role_map: &'a HashMap<String, String>,
}

pub struct AwsResponseAck;

#[async_trait]
impl ResourceHandler for AwsResponseAck {
    fn type_name(&self) -> &'static str {
        "aws_response_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Enables response runbooks on an AWS account")
            .with_id("The internal ID of the account.")
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
            )
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .required()
                    .requires_replace()
                    .with_description("The region the remediation stack runs in."),
            )
            .attribute(
                AttributeSchema::new("role_arn", AttributeType::String)
                    .required()
                    .requires_replace()
                    .with_description("The remediation role ARN."),
            )
            .attribute(
                AttributeSchema::new("runbook_list", types::string_list())
                    .required()
                    .with_description("The runbook list."),
            )
            .attribute(
                AttributeSchema::new("runbook_role_list", types::string_list())
                    .required()
                    .with_description("The runbook role list."),
            )
            .attribute(
                AttributeSchema::new("policy_to_role_map", types::string_map())
                    .required()
                    .with_description("The policy to role map."),
            )
            .attribute(
                AttributeSchema::new("external_id", AttributeType::String)
                    .required()
                    .with_description("The external ID."),
            )
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
        let input: AwsResponseAckInput = decode(resource)?;
        let account = client
            .find_account(FIELDS, &input.cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(&input.cloud_account_id))?;
        if account.remediation_ready() {
            return Err(ProviderError::new("Account remediation is already enabled"));
        }
        let token = account.collection_token.clone().unwrap_or_default();

        let body = serde_json::to_value(RemediationRequestBody {
            account_id: &input.cloud_account_id,
            region: &input.region,
            template_version: "1",
            external_id: &input.external_id,
            role_arn: &input.role_arn,
            stack_id: "terraform",
            runbook_list: &input.runbook_list,
            runbook_role_list: &input.runbook_role_list,
            policy_to_role_map: &input.policy_to_role_map,
        })
        .map_err(|e| ProviderError::new("Unable to encode remediation acknowledgement").with_cause(e))?;
        client
            .acknowledge(
                Method::POST,
                REMEDIATION_ACK_PATH,
                AckAuth::Bearer(&token),
                Some(&body),
            )
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("streamsec_collection_token", Some(token))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let cloud_account_id = state_str(current, "cloud_account_id")?;
        let Some(account) = client
            .find_account(FIELDS, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            return Ok(None);
        };
        if !account.remediation_ready() {
            return Ok(None);
        }

        let remediation = account.remediation.unwrap_or_default();
        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("streamsec_collection_token", account.collection_token)
                .string("role_arn", remediation.role_arn)
                .list("runbook_list", remediation.runbook_list)
                .list("runbook_role_list", remediation.runbook_role_list)
                .map("policy_to_role_map", remediation.policy_to_role_map.as_ref())
                .string("external_id", remediation.external_id.or(account.external_id))
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, _client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        let token = current.get_str("streamsec_collection_token").unwrap_or_default();
        delete_remediation(client, state_str(current, "cloud_account_id")?, token).await
    }
}
