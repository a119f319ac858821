//! aws_real_time_events_ack - Enables CloudTrail real-time events for one
//! region of an AWS account

use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Attributes, Resource, ResourceId, State, Value};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};

const CFT_EVENT_PATH: &str = "/api/v1/collection/cloudtrail/cft-event";

const FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions stack_region \
     template_url external_id lightlytics_collection_token account_auth_token realtime_regions { region_name }";

#[derive(Debug, Deserialize)]
struct AwsRealTimeEventsAckInput {
    cloud_account_id: String,
    region: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CftEventRequestBody<'a> {
    account_id: &'a str,
    region: &'a str,
    template_version: &'a str,
    #[serde(rename = "operation")]
    operation: &'a str,
}

async fn send(
    client: &ApiClient,
    operation: &str,
    cloud_account_id: &str,
    region: &str,
    collection_token: &str,
) -> ProviderResult<()> {
    let body = serde_json::to_value(CftEventRequestBody {
        account_id: cloud_account_id,
        region,
        template_version: "1",
        operation,
    })
    .map_err(|e| ProviderError::new("Unable to encode real-time events acknowledgement").with_cause(e))?;
    client
        .acknowledge(
            Method::POST,
            CFT_EVENT_PATH,
            AckAuth::CollectionToken(collection_token),
            Some(&body),
        )
        .await
        .map_err(api_error("Unable to ack region"))
}

pub struct AwsRealTimeEventsAck;

#[async_trait]
impl ResourceHandler for AwsRealTimeEventsAck {
    fn type_name(&self) -> &'static str {
        "aws_real_time_events_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Enables real-time events for a region of an AWS account")
            .with_id("The internal ID of the account.")
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .required()
                    .requires_replace()
                    .with_description("The region to ack."),
            )
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
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

    /// Import ids are written `account_id,region`
    fn import_state(&self, id: ResourceId, import_id: &str) -> ProviderResult<State> {
        let parts: Vec<&str> = import_id.split(',').collect();
        let [account_id, region] = parts.as_slice() else {
            return Err(invalid_import_id(import_id));
        };
        if account_id.is_empty() || region.is_empty() {
            return Err(invalid_import_id(import_id));
        }

        let mut attributes = Attributes::new();
        attributes.insert("cloud_account_id".to_string(), Value::String(account_id.to_string()));
        attributes.insert("region".to_string(), Value::String(region.to_string()));
        Ok(State::existing(id, attributes))
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AwsRealTimeEventsAckInput = decode(resource)?;
        let account = client
            .find_account(FIELDS, &input.cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(&input.cloud_account_id))?;

        if account.has_realtime_region(&input.region) {
            return Err(ProviderError::new(
                "Region already exists: The specified region is already enabled for real-time events. \
                 Please import it with `streamsec import`.",
            ));
        }

        let token = account.collection_token.clone().unwrap_or_default();
        send(client, "Create", &input.cloud_account_id, &input.region, &token).await?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("streamsec_collection_token", Some(token))
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let cloud_account_id = state_str(current, "cloud_account_id")?;
        let region = state_str(current, "region")?;
        let Some(account) = client
            .find_account(FIELDS, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            return Ok(None);
        };
        if !account.has_realtime_region(region) {
            debug!("Region {} is no longer enabled on {}", region, cloud_account_id);
            return Ok(None);
        }

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("streamsec_collection_token", account.collection_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, _client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        let token = current.get_str("streamsec_collection_token").unwrap_or_default();
        send(
            client,
            "Delete",
            state_str(current, "cloud_account_id")?,
            state_str(current, "region")?,
            token,
        )
        .await
    }
}

fn invalid_import_id(import_id: &str) -> ProviderError {
    ProviderError::new(format!(
        "Expected import identifier with format: account_id,region. Got: {:?}",
        import_id
    ))
}
