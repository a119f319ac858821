//! aws_account - An AWS account onboarded to Stream.Security

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::convert::equal_lists;
use streamsec_core::provider::ProviderResult;
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{delete_account, update_account};
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, account_not_found, api_error, decode, state_str};
use crate::models::Account;

const CREATE_ACCOUNT: &str = r#"
    mutation CreateAccount($account_type: CloudProvider!, $cloud_account_id: String!, $display_name: String, $cloud_regions: [String], $stack_region: String) {
        createAccount(account: {
            account_type: $account_type,
            cloud_account_id: $cloud_account_id,
            display_name: $display_name,
            cloud_regions: $cloud_regions,
            stack_region: $stack_region
        }) {
            _id
            template_url
            external_id
            lightlytics_collection_token
            account_auth_token
        }
    }"#;

pub(crate) const ACCOUNT_FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions stack_region \
     template_url external_id lightlytics_collection_token account_auth_token";

#[derive(Debug, Deserialize)]
struct AwsAccountInput {
    display_name: String,
    cloud_account_id: String,
    cloud_regions: Vec<String>,
    stack_region: String,
}

pub struct AwsAccount;

#[async_trait]
impl ResourceHandler for AwsAccount {
    fn type_name(&self) -> &'static str {
        "aws_account"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("An AWS account connected to Stream.Security")
            .with_id("The ID of the account.")
            .attribute(
                AttributeSchema::new("display_name", AttributeType::String)
                    .required()
                    .with_description("The display name of the account."),
            )
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .requires_replace()
                    .with_description("The cloud account ID."),
            )
            .attribute(
                AttributeSchema::new("cloud_regions", types::string_list())
                    .required()
                    .with_description("The cloud regions."),
            )
            .attribute(
                AttributeSchema::new("stack_region", AttributeType::String)
                    .required()
                    .with_description("The stack region."),
            )
            .attribute(
                AttributeSchema::new("template_url", AttributeType::String)
                    .computed()
                    .with_description("The template URL."),
            )
            .attribute(
                AttributeSchema::new("external_id", AttributeType::String)
                    .computed()
                    .with_description("The external ID."),
            )
            .attribute(
                AttributeSchema::new("streamsec_collection_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The Streamsec collection token."),
            )
            .attribute(
                AttributeSchema::new("account_auth_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The account auth token."),
            )
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: AwsAccountInput = decode(resource)?;
        let variables = json!({
            "account_type": "AWS",
            "cloud_account_id": input.cloud_account_id,
            "display_name": input.display_name,
            "cloud_regions": input.cloud_regions,
            "stack_region": input.stack_region,
        });

        let account: Account = client
            .mutate(CREATE_ACCOUNT, &variables, "createAccount")
            .await
            .map_err(api_error("Unable to create account"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(account.id))
            .string("template_url", account.template_url)
            .string("external_id", account.external_id)
            .string("streamsec_collection_token", account.collection_token)
            .string("account_auth_token", account.account_auth_token)
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        // After an import only the internal id is known
        let account = match current.get_str("cloud_account_id") {
            Some(cloud_account_id) => client
                .find_account(ACCOUNT_FIELDS, cloud_account_id)
                .await
                .map_err(api_error("Unable to get account"))?
                .ok_or_else(|| account_not_found(cloud_account_id))?,
            None => {
                let id = state_str(current, "id")?;
                client
                    .find_account_by_id(ACCOUNT_FIELDS, id)
                    .await
                    .map_err(api_error("Unable to get account"))?
                    .ok_or_else(|| account_not_found(id))?
            }
        };

        Ok(Some(
            StateAttributes::from_state(current)
                .string("id", Some(account.id))
                .string("cloud_account_id", account.cloud_account_id)
                .string("display_name", account.display_name)
                .list("cloud_regions", account.cloud_regions)
                .string("stack_region", account.stack_region)
                .string("template_url", account.template_url)
                .string("external_id", account.external_id)
                .string("streamsec_collection_token", account.collection_token)
                .string("account_auth_token", account.account_auth_token)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: AwsAccountInput = decode(to)?;
        let regions_changed = match (from.attributes.get("cloud_regions"), to.attributes.get("cloud_regions")) {
            (Some(a), Some(b)) => !equal_lists(a, b),
            _ => true,
        };

        if from.get_str("display_name") != Some(input.display_name.as_str()) || regions_changed {
            update_account(
                client,
                state_str(from, "id")?,
                json!({
                    "cloud_regions": input.cloud_regions,
                    "display_name": input.display_name,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts, mock_mutation};
    use mockito::Matcher;
    use streamsec_core::convert::from_string_list;
    use streamsec_core::resource::{ResourceId, Value};

    fn desired(display_name: &str, regions: &[&str]) -> Resource {
        Resource::new("aws_account", "prod")
            .with_attribute("display_name", Value::String(display_name.to_string()))
            .with_attribute("cloud_account_id", Value::String("123456789012".to_string()))
            .with_attribute("cloud_regions", from_string_list(regions.iter().copied()))
            .with_attribute("stack_region", Value::String("us-east-1".to_string()))
    }

    #[test]
    fn schema_validates_account_id() {
        let schema = AwsAccount.schema();
        assert!(schema.validate(&desired("prod", &["us-east-1"]).attributes).is_ok());

        let bad = desired("prod", &["us-east-1"])
            .with_attribute("cloud_account_id", Value::String("1234".to_string()));
        assert!(schema.validate(&bad.attributes).is_err());

        // Arabic-Indic digits are still twelve digits to a Unicode `\d`
        let non_ascii = desired("prod", &["us-east-1"]).with_attribute(
            "cloud_account_id",
            Value::String("\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}\u{667}\u{668}\u{669}\u{660}\u{661}\u{662}".to_string()),
        );
        assert!(schema.validate(&non_ascii.attributes).is_err());
    }

    #[tokio::test]
    async fn create_then_read() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "variables": {
                    "account_type": "AWS",
                    "cloud_account_id": "123456789012",
                    "cloud_regions": ["us-east-1", "eu-west-1"]
                }
            })))
            .with_status(200)
            .with_body(
                json!({"data": {"createAccount": {
                    "_id": "64f0c1",
                    "template_url": "https://s3.amazonaws.com/template.yml",
                    "external_id": "ext-1",
                    "lightlytics_collection_token": "collect-1",
                    "account_auth_token": "auth-1"
                }}})
                .to_string(),
            )
            .create_async()
            .await;
        mock_accounts(
            &mut server,
            json!([{
                "_id": "64f0c1",
                "account_type": "AWS",
                "cloud_account_id": "123456789012",
                "display_name": "prod",
                "cloud_regions": ["us-east-1", "eu-west-1"],
                "stack_region": "us-east-1",
                "template_url": "https://s3.amazonaws.com/template.yml",
                "external_id": "ext-1",
                "lightlytics_collection_token": "collect-1",
                "account_auth_token": "auth-1"
            }]),
        )
        .await;

        let client = client(&server);
        let resource = desired("prod", &["us-east-1", "eu-west-1"]);
        let created = AwsAccount.create(&client, &resource).await.unwrap();
        create.assert_async().await;
        assert_eq!(created.identifier.as_deref(), Some("64f0c1"));
        assert_eq!(created.get_str("streamsec_collection_token"), Some("collect-1"));

        let read = AwsAccount.read(&client, &created).await.unwrap().unwrap();
        assert_eq!(read.attributes, created.attributes);
    }

    #[tokio::test]
    async fn read_missing_account_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([])).await;

        let state = StateAttributes::default()
            .string("id", Some("64f0c1"))
            .string("cloud_account_id", Some("123456789012"))
            .into_state(ResourceId::new("aws_account", "prod"));
        let err = AwsAccount.read(&client(&server), &state).await.unwrap_err();
        assert!(err.message.contains("123456789012 not found"));
    }

    #[tokio::test]
    async fn read_after_import_matches_internal_id() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(
            &mut server,
            json!([{"_id": "64f0c1", "cloud_account_id": "123456789012", "display_name": "prod"}]),
        )
        .await;

        let seeded = AwsAccount
            .import_state(ResourceId::new("aws_account", "prod"), "64f0c1")
            .unwrap();
        let read = AwsAccount.read(&client(&server), &seeded).await.unwrap().unwrap();
        assert_eq!(read.get_str("cloud_account_id"), Some("123456789012"));
    }

    #[tokio::test]
    async fn update_skips_api_when_nothing_relevant_changed() {
        let server = mockito::Server::new_async().await;
        let from = StateAttributes::from_resource(&desired("prod", &["us-east-1"]))
            .string("id", Some("64f0c1"))
            .into_state(ResourceId::new("aws_account", "prod"));

        // No mock registered: any request would fail the update
        let state = AwsAccount
            .update(&client(&server), &from, &desired("prod", &["us-east-1"]))
            .await
            .unwrap();
        assert_eq!(state.get_str("id"), Some("64f0c1"));
    }

    #[tokio::test]
    async fn update_sends_regions_when_they_change() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_mutation(&mut server, "updateAccount", json!({"updateAccount": {"_id": "64f0c1"}})).await;
        let from = StateAttributes::from_resource(&desired("prod", &["us-east-1"]))
            .string("id", Some("64f0c1"))
            .into_state(ResourceId::new("aws_account", "prod"));

        let to = desired("prod", &["us-east-1", "eu-west-1"]);
        let state = AwsAccount.update(&client(&server), &from, &to).await.unwrap();
        m.assert_async().await;
        assert_eq!(state.attributes.get("cloud_regions"), to.attributes.get("cloud_regions"));
    }
}
