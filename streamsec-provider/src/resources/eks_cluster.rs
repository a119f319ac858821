//! eks_cluster - An EKS cluster registered for Kubernetes collection

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use streamsec_core::provider::{ProviderError, ProviderResult};
use streamsec_core::resource::{Resource, State};
use streamsec_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{delete_account, update_account};
use crate::client::ApiClient;
use crate::handler::{ResourceHandler, StateAttributes, api_error, decode, state_str};
use crate::models::Kubernetes;

const CREATE_KUBERNETES: &str = r#"
    mutation CreateKubernetes($display_name: String, $eks_arn: String) {
        createKubernetes(kubernetes: {
            display_name: $display_name,
            eks_arn: $eks_arn,
        }) {
            _id
            status
            collection_token
            creation_date
        }
    }"#;

const LIST_KUBERNETES: &str = r#"
    query {
        kubernetes {
            _id
            display_name
            eks_arn
            status
            collection_token
            creation_date
        }
    }"#;

#[derive(Debug, Deserialize)]
struct EksClusterInput {
    eks_arn: String,
    display_name: String,
}

pub struct EksCluster;

#[async_trait]
impl ResourceHandler for EksCluster {
    fn type_name(&self) -> &'static str {
        "eks_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("An EKS cluster monitored by Stream.Security")
            .with_id("The ID of the EKS cluster.")
            .attribute(
                AttributeSchema::new("eks_arn", AttributeType::String)
                    .required()
                    .with_description("The arn of the EKS cluster."),
            )
            .attribute(
                AttributeSchema::new("display_name", AttributeType::String)
                    .required()
                    .with_description("The display name of the EKS cluster."),
            )
            .attribute(
                AttributeSchema::new("status", AttributeType::String)
                    .computed()
                    .with_description("The EKS cluster status."),
            )
            .attribute(
                AttributeSchema::new("collection_token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("The collection_token."),
            )
            .attribute(
                AttributeSchema::new("creation_date", AttributeType::String)
                    .computed()
                    .with_description("The creation_date."),
            )
    }

    async fn create(&self, client: &ApiClient, resource: &Resource) -> ProviderResult<State> {
        let input: EksClusterInput = decode(resource)?;
        let variables = json!({
            "display_name": input.display_name,
            "eks_arn": input.eks_arn,
        });

        let cluster: Kubernetes = client
            .mutate(CREATE_KUBERNETES, &variables, "createKubernetes")
            .await
            .map_err(api_error("Unable to create EKS cluster"))?;

        Ok(StateAttributes::from_resource(resource)
            .string("id", Some(cluster.id))
            .string("status", cluster.status)
            .string("collection_token", cluster.collection_token)
            .string("creation_date", cluster.creation_date)
            .into_state(resource.id.clone()))
    }

    async fn read(&self, client: &ApiClient, current: &State) -> ProviderResult<Option<State>> {
        let id = state_str(current, "id")?;
        let data = client
            .graphql(LIST_KUBERNETES, None)
            .await
            .map_err(api_error("Unable to get EKS cluster"))?;
        let clusters: Vec<Kubernetes> = match data.get("kubernetes") {
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(list) => serde_json::from_value(list.clone()).map_err(|e| {
                ProviderError::new("Unable to get EKS cluster, got error").with_cause(e)
            })?,
        };

        let cluster = clusters.into_iter().find(|c| c.id == id).ok_or_else(|| {
            ProviderError::new(format!(
                "Unable to get EKS cluster, cluster with id: {} not found in Stream.Security API.",
                id
            ))
        })?;

        Ok(Some(
            StateAttributes::from_state(current)
                .string("display_name", cluster.display_name)
                .string("eks_arn", cluster.eks_arn)
                .string("status", cluster.status)
                .string("collection_token", cluster.collection_token)
                .string("creation_date", cluster.creation_date)
                .into_state(current.id.clone()),
        ))
    }

    async fn update(&self, client: &ApiClient, from: &State, to: &Resource) -> ProviderResult<State> {
        let input: EksClusterInput = decode(to)?;
        if from.get_str("display_name") != Some(input.display_name.as_str()) {
            update_account(
                client,
                state_str(from, "id")?,
                json!({ "display_name": input.display_name }),
            )
            .await?;
        }
        Ok(StateAttributes::carry_over(from, to).into_state(to.id.clone()))
    }

    async fn delete(&self, client: &ApiClient, current: &State) -> ProviderResult<()> {
        delete_account(client, state_str(current, "id")?).await
    }
}
