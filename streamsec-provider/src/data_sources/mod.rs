//! Read-only lookups of accounts that already exist in Stream.Security

mod aws_account;
mod azure_tenant;
mod gcp_project;

pub use aws_account::AwsAccountData;
pub use azure_tenant::AzureTenantData;
pub use gcp_project::GcpProjectData;

use streamsec_core::schema::{AttributeSchema, AttributeType};

use crate::handler::DataSourceHandler;

pub fn all() -> Vec<Box<dyn DataSourceHandler>> {
    vec![
        Box::new(AwsAccountData),
        Box::new(AzureTenantData),
        Box::new(GcpProjectData),
    ]
}

/// A string the lookup fills in
fn output(name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .computed()
        .with_description(description)
}
