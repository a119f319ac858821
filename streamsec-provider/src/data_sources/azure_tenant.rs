//! azure_tenant data source

use async_trait::async_trait;
use serde::Deserialize;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, ResourceSchema, types};

use super::output;
use crate::client::ApiClient;
use crate::handler::{DataSourceHandler, StateAttributes, api_error, decode, deleting};

const FIELDS: &str = "_id account_type cloud_account_id display_name template_url external_id account_token status";

#[derive(Debug, Deserialize)]
struct AzureTenantQuery {
    tenant_id: String,
}

pub struct AzureTenantData;

#[async_trait]
impl DataSourceHandler for AzureTenantData {
    fn type_name(&self) -> &'static str {
        "azure_tenant"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Looks up an Azure tenant by its tenant ID")
            .attribute(
                AttributeSchema::new("tenant_id", types::azure_tenant_id())
                    .required()
                    .with_description("azure tenant id"),
            )
            .attribute(output("id", "The internal ID of the account."))
            .attribute(output("display_name", "The display name of the tenant."))
            .attribute(output("template_url", "The template URL of the tenant."))
            .attribute(output("account_token", "The account token of the tenant.").sensitive())
    }

    async fn read(&self, client: &ApiClient, query: &Resource) -> ProviderResult<State> {
        let input: AzureTenantQuery = decode(query)?;
        let account = client
            .find_account(FIELDS, &input.tenant_id)
            .await
            .map_err(api_error("Unable to get account"))?
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Unable to get Azure tenant, Azure tenant with id: {} not found in Stream.Security API.",
                    input.tenant_id
                ))
            })?;
        if account.is_deleting() {
            return Err(deleting("Azure tenant", &input.tenant_id));
        }

        Ok(StateAttributes::from_resource(query)
            .string("id", Some(account.id))
            .string("display_name", account.display_name)
            .string("template_url", account.template_url)
            .string("account_token", account.account_token)
            .into_state(query.id.clone()))
    }
}
