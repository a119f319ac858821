//! aws_account data source

use async_trait::async_trait;
use serde::Deserialize;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, ResourceSchema, types};

use super::output;
use crate::client::ApiClient;
use crate::handler::{DataSourceHandler, StateAttributes, api_error, decode};

const FIELDS: &str = "_id account_type cloud_account_id display_name cloud_regions template_url \
     external_id lightlytics_collection_token account_auth_token status";

#[derive(Debug, Deserialize)]
struct AwsAccountQuery {
    cloud_account_id: String,
}

pub struct AwsAccountData;

#[async_trait]
impl DataSourceHandler for AwsAccountData {
    fn type_name(&self) -> &'static str {
        "aws_account"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Looks up an AWS account by its cloud account ID")
            .attribute(
                AttributeSchema::new("cloud_account_id", types::aws_account_id())
                    .required()
                    .with_description("aws account id"),
            )
            .attribute(output("id", "The internal ID of the account."))
            .attribute(output("display_name", "The display name of the account."))
            .attribute(
                AttributeSchema::new("cloud_regions", types::string_list())
                    .computed()
                    .with_description("The cloud regions of the account."),
            )
            .attribute(output("template_url", "The template URL of the account."))
            .attribute(output("external_id", "The external ID of the account."))
            .attribute(
                output(
                    "streamsec_collection_token",
                    "The Stream Security collection token of the account.",
                )
                .sensitive(),
            )
            .attribute(output("account_auth_token", "The account auth token of the account.").sensitive())
    }

    async fn read(&self, client: &ApiClient, query: &Resource) -> ProviderResult<State> {
        let input: AwsAccountQuery = decode(query)?;
        let Some(account) = client
            .find_account(FIELDS, &input.cloud_account_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            return Ok(State::not_found(query.id.clone()));
        };
        if account.is_deleting() {
            return Err(ProviderError::new(format!(
                "Resource status is DELETING: Account with cloud_account_id: {} is being deleted.",
                input.cloud_account_id
            )));
        }

        Ok(StateAttributes::from_resource(query)
            .string("id", Some(account.id))
            .string("display_name", account.display_name)
            .list("cloud_regions", account.cloud_regions)
            .string("template_url", account.template_url)
            .string("external_id", account.external_id)
            .string("streamsec_collection_token", account.collection_token)
            .string("account_auth_token", account.account_auth_token)
            .into_state(query.id.clone()))
    }
}
