//! gcp_project data source

use async_trait::async_trait;
use serde::Deserialize;
use streamsec_core::provider::ProviderResult;
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, ResourceSchema, types};

use super::output;
use crate::client::ApiClient;
use crate::handler::{DataSourceHandler, StateAttributes, api_error, decode, deleting};

const FIELDS: &str = "_id account_type cloud_account_id display_name account_token status";

#[derive(Debug, Deserialize)]
struct GcpProjectQuery {
    project_id: String,
}

pub struct GcpProjectData;

#[async_trait]
impl DataSourceHandler for GcpProjectData {
    fn type_name(&self) -> &'static str {
        "gcp_project"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Looks up a GCP project by its project ID")
            .attribute(
                AttributeSchema::new("project_id", types::gcp_project_id())
                    .required()
                    .with_description("The GCP Project ID."),
            )
            .attribute(output("id", "The internal ID of the account."))
            .attribute(output("display_name", "The display name of the project."))
            .attribute(output("account_token", "The account token of the project.").sensitive())
    }

    async fn read(&self, client: &ApiClient, query: &Resource) -> ProviderResult<State> {
        let input: GcpProjectQuery = decode(query)?;
        let Some(account) = client
            .find_account(FIELDS, &input.project_id)
            .await
            .map_err(api_error("Unable to get account"))?
        else {
            return Ok(State::not_found(query.id.clone()));
        };
        if account.is_deleting() {
            return Err(deleting("GCP project", &input.project_id));
        }

        Ok(StateAttributes::from_resource(query)
            .string("id", Some(account.id))
            .string("display_name", account.display_name)
            .string("account_token", account.account_token)
            .into_state(query.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{client, mock_accounts};
    use serde_json::json;
    use streamsec_core::resource::Value;

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        mock_accounts(&mut server, json!([{"_id": "g-2", "cloud_account_id": "acme-other"}])).await;

        let query = Resource::new("gcp_project", "analytics")
            .with_attribute("project_id", Value::String("acme-analytics".to_string()))
            .with_read_only(true);
        let state = GcpProjectData.read(&client(&server), &query).await.unwrap();
        assert!(!state.exists);
    }
}
