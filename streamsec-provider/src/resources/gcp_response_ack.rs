//! gcp_response_ack - Installs response (remediation) runbooks on a GCP project

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::delete_remediation;
use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};
use crate::models::Account;

const GCP_REMEDIATION_PATH: &str = "/gcp/remediation-acknowledge";

const FIELDS: &str = "_id cloud_account_id account_token remediation { status runbook_list location }";

#[derive(Debug, Deserialize)]
struct GcpResponseAckInput {
    cloud_account_id: String,
    runbook_list: Vec<String>,
    location: String,
    template_version: String,
}

#[derive(Debug, Serialize)]
struct GcpRemediationRequestBody<'a> {
    gcp_project_id: &'a str,
    template_version: &'a str,
    runbook_list: &'a [String],
    location: &'a str,
}

pub struct GcpResponseAck;

impl GcpResponseAck {
    async fn find(&self, client: &ApiClient, cloud_account_id: &str) -> ProviderResult<Account> {
        client
            .find_account(FIELDS, cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| account_not_found(cloud_account_id))
    }

    async fn acknowledge(
        &self,
        client: &ApiClient,
        input: &GcpResponseAckInput,
        token: &str,
        context: &'static str,
    ) -> ProviderResult<()> {
        let body = serde_json::to_value(GcpRemediationRequestBody {
            gcp_project_id: &input.cloud_account_id,
            template_version: &input.template_version,
            runbook_list: &input.runbook_list,
            location: &input.location,
        })
        .map_err(|e| ProviderError::new("Unable to encode remediation acknowledgement").with_cause(e))?;
        client
            .acknowledge(Method::POST, GCP_REMEDIATION_PATH, AckAuth::Bearer(token), Some(&body))
            .await
            .map_err(api_error(context))
    }
}

#[async_trait]
impl ResourceHandler for GcpResponseAck {
    fn type_name(&self) -> &'static str {
        "gcp_response_ack"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Enables response runbooks on a GCP project")
            .with_id("The internal ID of the account.")
            .attribute(
                AttributeSchema::new("cloud_account_id", types::gcp_project_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
            )
            .attribute(
                AttributeSchema::new("runbook_list", types::string_list())
                    .required()
                    .with_description("The runbook list."),
            )
            .attribute(
                AttributeSchema::new("location", AttributeType::String)
                    .required()
                    .with_description("The location."),
            )
            .attribute(
                AttributeSchema::new("template_version", AttributeType::String)
                    .required()
                    .with_description("The template version."),
            )
            .attribute(
                AttributeSchema::new("account_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The account token."),
            )
    }

    fn import_attribute(&self) -> &'static str {
        "cloud_account_id"
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: GcpResponseAckInput = decode(resource)?;
        let account = self.find(client, &input.cloud_account_id).await?;
        if account.remediation_ready() {
            return Err(ProviderError::new("Account remediation is already enabled"));
        }
        let token = account.account_token.clone().unwrap_or_default();

        self.acknowledge(client, &input, &token, "Unable to create account")
            .await?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("account_token", Some(token))
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
                .string("account_token", account.account_token)
                .list("runbook_list", remediation.runbook_list)
                .string("location", remediation.location)
                .into_state(current.id.clone()),
        ))
    }

    /// Re-acknowledging replaces the installed runbooks
    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: GcpResponseAckInput = decode(to)?;
        let account = self.find(client, &input.cloud_account_id).await?;
        let token = account.account_token.clone().unwrap_or_default();

        self.acknowledge(client, &input, &token, "Unable to update account")
            .await?;

        Ok(StateAttributes::carry_over(from, to)
            .string("id", Some(account.id))
            .string("account_token", Some(token))
            .into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        let token = current.get_str("account_token").unwrap_or_default();
        delete_remediation(client, state_str(current, "cloud_account_id")?, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts};
    use mockito::Matcher;
    use serde_json::json;
    use streamsec_core::convert::from_string_list;
    use streamsec_core::resource::{ResourceId, Value};

    fn desired(runbooks: &[&str]) -> Resource {
        Resource::new("gcp_response_ack", "analytics")
            .with_attribute("cloud_account_id", Value::String("acme-analytics".to_string()))
            .with_attribute("runbook_list", from_string_list(runbooks.iter().copied()))
            .with_attribute("location", Value::String("us-central1".to_string()))
            .with_attribute("template_version", Value::String("2".to_string()))
    }

    #[tokio::test]
    async fn create_posts_remediation_with_account_token() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "g-1", "cloud_account_id": "acme-analytics", "account_token": "acct-tok"}]),
        )
        .await;
        let ack = server
            .mock("POST", GCP_REMEDIATION_PATH)
            .match_header("authorization", "Bearer acct-tok")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "gcp_project_id": "acme-analytics",
                "template_version": "2",
                "runbook_list": ["disable-sa-key"],
                "location": "us-central1"
            })))
            .with_status(200)
            .create_async()
            .await;

        let state = GcpResponseAck
            .create(&client(&server), &desired(&["disable-sa-key"]))
            .await
            .unwrap();
        ack.assert_async().await;
        assert_eq!(state.get_str("account_token"), Some("acct-tok"));
    }

    #[tokio::test]
    async fn create_refuses_when_already_ready() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "g-1", "cloud_account_id": "acme-analytics", "remediation": {"status": "READY"}}]),
        )
        .await;

        let err = GcpResponseAck
            .create(&client(&server), &desired(&["disable-sa-key"]))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Account remediation is already enabled");
    }

    #[tokio::test]
    async fn read_refreshes_runbooks_and_location() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{
                "_id": "g-1",
                "cloud_account_id": "acme-analytics",
                "account_token": "acct-tok",
                "remediation": {
                    "status": "READY",
                    "runbook_list": ["disable-sa-key", "stop-vm"],
                    "location": "europe-west1"
                }
            }]),
        )
        .await;

        let current = GcpResponseAck
            .import_state(ResourceId::new("gcp_response_ack", "analytics"), "acme-analytics")
            .unwrap();
        let state = GcpResponseAck
            .read(&client(&server), &current)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            state.attributes.get("runbook_list"),
            Some(&from_string_list(["disable-sa-key", "stop-vm"]))
        );
        assert_eq!(state.get_str("location"), Some("europe-west1"));
    }

    #[tokio::test]
    async fn read_without_remediation_is_removed() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([{"_id": "g-1", "cloud_account_id": "acme-analytics"}])).await;

        let current = GcpResponseAck
            .import_state(ResourceId::new("gcp_response_ack", "analytics"), "acme-analytics")
            .unwrap();
        assert!(GcpResponseAck.read(&client(&server), &current).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_reacknowledges() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "g-1", "cloud_account_id": "acme-analytics", "account_token": "acct-tok"}]),
        )
        .await;
        let ack = server
            .mock("POST", GCP_REMEDIATION_PATH)
            .match_body(Matcher::PartialJson(json!({"runbook_list": ["disable-sa-key", "stop-vm"]})))
            .with_status(200)
            .create_async()
            .await;
        let from = StateAttributes::from_resource(&desired(&["disable-sa-key"]))
            .string("id", Some("g-1"))
            .into_state(ResourceId::new("gcp_response_ack", "analytics"));

        let state = GcpResponseAck
            .update(&client(&server), &from, &desired(&["disable-sa-key", "stop-vm"]))
            .await
            .unwrap();
        ack.assert_async().await;
        assert_eq!(state.get_str("account_token"), Some("acct-tok"));
    }

    #[tokio::test]
    async fn delete_uses_account_token() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("DELETE", "/api/accounts/accounts/remediation/acme-analytics")
            .match_header("authorization", "Bearer acct-tok")
            .with_status(200)
            .create_async()
            .await;

        let current = StateAttributes::from_resource(&desired(&["disable-sa-key"]))
            .string("account_token", Some("acct-tok"))
            .into_state(ResourceId::new("gcp_response_ack", "analytics"));
        GcpResponseAck.delete(&client(&server), &current).await.unwrap();
        m.assert_async().await;
    }
}
