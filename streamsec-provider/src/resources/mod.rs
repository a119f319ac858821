//! Managed resource types

mod aws_account;
mod aws_account_ack;
mod aws_cost_ack;
mod aws_real_time_events_ack;
mod aws_response_ack;
mod azure_tenant;
mod azure_tenant_ack;
mod eks_cluster;
mod gcp_project;
mod gcp_project_ack;
mod gcp_response_ack;
mod google_workspace;

pub use aws_account::AwsAccount;
pub use aws_account_ack::AwsAccountAck;
pub use aws_cost_ack::AwsCostAck;
pub use aws_real_time_events_ack::AwsRealTimeEventsAck;
pub use aws_response_ack::AwsResponseAck;
pub use azure_tenant::AzureTenant;
pub use azure_tenant_ack::AzureTenantAck;
pub use eks_cluster::EksCluster;
pub use gcp_project::GcpProject;
pub use gcp_project_ack::GcpProjectAck;
pub use gcp_response_ack::GcpResponseAck;
pub use google_workspace::GoogleWorkspace;

use serde_json::json;
use streamsec_core::provider::ProviderResult;

use crate::client::{AckAuth, ApiClient};
use crate::handler::{ResourceHandler, api_error};

/// Every resource handler, in registration order
pub fn all() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(AwsAccount),
        Box::new(EksCluster),
        Box::new(AwsAccountAck),
        Box::new(AwsCostAck),
        Box::new(AwsRealTimeEventsAck),
        Box::new(AwsResponseAck),
        Box::new(AzureTenant),
        Box::new(AzureTenantAck),
        Box::new(GcpProject),
        Box::new(GcpProjectAck),
        Box::new(GcpResponseAck),
        Box::new(GoogleWorkspace),
    ]
}

const UPDATE_ACCOUNT: &str = r#"
    mutation UpdateAccount($id: ID!, $account: AccountUpdateInput) {
        updateAccount(id: $id, account: $account) {
            _id
        }
    }"#;

const DELETE_ACCOUNT: &str = r#"
    mutation DeleteAccount($id: ID!) {
        deleteAccount(id: $id)
    }"#;

/// Apply a partial `AccountUpdateInput` to the account with internal id `id`
async fn update_account(
    client: &ApiClient,
    id: &str,
    account: serde_json::Value,
) -> ProviderResult<()> {
    let variables = json!({ "id": id, "account": account });
    client
        .graphql(UPDATE_ACCOUNT, Some(&variables))
        .await
        .map_err(api_error("Unable to update account"))?;
    Ok(())
}

async fn delete_account(client: &ApiClient, id: &str) -> ProviderResult<()> {
    let variables = json!({ "id": id });
    client
        .graphql(DELETE_ACCOUNT, Some(&variables))
        .await
        .map_err(api_error("Unable to delete account"))?;
    Ok(())
}

/// Uninstall response runbooks; shared by the AWS and GCP response acks
async fn delete_remediation(
    client: &ApiClient,
    cloud_account_id: &str,
    token: &str,
) -> ProviderResult<()> {
    let path = format!("/api/accounts/accounts/remediation/{}", cloud_account_id);
    client
        .acknowledge(reqwest::Method::DELETE, &path, AckAuth::Bearer(token), None)
        .await
        .map_err(api_error("Unable to delete remediation"))
}

#[cfg(test)]
pub(crate) mod testing {
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;

    use crate::client::ApiClient;

    pub fn client(server: &ServerGuard) -> ApiClient {
        ApiClient::with_token(server.url(), "session-token").unwrap()
    }

    /// Answer any `accounts` query with the given records
    pub async fn mock_accounts(server: &mut ServerGuard, accounts: serde_json::Value) -> Mock {
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r"accounts \{".to_string()))
            .with_status(200)
            .with_body(json!({ "data": { "accounts": accounts } }).to_string())
            .create_async()
            .await
    }

    /// Answer a GraphQL operation whose body mentions `operation`
    pub async fn mock_mutation(
        server: &mut ServerGuard,
        operation: &str,
        data: serde_json::Value,
    ) -> Mock {
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(operation.to_string()))
            .with_status(200)
            .with_body(json!({ "data": data }).to_string())
            .create_async()
            .await
    }
}
