//! Typed records returned by the Stream.Security API
//!
//! Every field is optional because each query selects only what it needs.

use std::collections::HashMap;

use serde::Deserialize;

/// Status the API reports while an account is being torn down
pub const STATUS_DELETING: &str = "DELETING";
/// Remediation status once response runbooks are installed
pub const REMEDIATION_READY: &str = "READY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub account_type: Option<String>,
    pub cloud_account_id: Option<String>,
    pub display_name: Option<String>,
    pub cloud_regions: Option<Vec<String>>,
    pub stack_region: Option<String>,
    pub template_url: Option<String>,
    pub external_id: Option<String>,
    #[serde(rename = "lightlytics_collection_token")]
    pub collection_token: Option<String>,
    pub account_auth_token: Option<String>,
    pub account_token: Option<String>,
    pub status: Option<String>,
    pub role_arn: Option<String>,
    pub client_id: Option<String>,
    pub client_email: Option<String>,
    pub subscriptions: Option<Vec<Subscription>>,
    pub realtime_regions: Option<Vec<RealtimeRegion>>,
    pub remediation: Option<Remediation>,
    pub cost: Option<Cost>,
}

impl Account {
    pub fn is_deleting(&self) -> bool {
        self.status.as_deref() == Some(STATUS_DELETING)
    }

    pub fn remediation_ready(&self) -> bool {
        self.remediation
            .as_ref()
            .and_then(|r| r.status.as_deref())
            == Some(REMEDIATION_READY)
    }

    pub fn has_realtime_region(&self, region: &str) -> bool {
        self.realtime_regions
            .iter()
            .flatten()
            .any(|r| r.region_name.as_deref() == Some(region))
    }

    /// Subscription ids in API order; empty when the account has none
    pub fn subscription_ids(&self) -> Vec<String> {
        self.subscriptions
            .iter()
            .flatten()
            .filter_map(|s| s.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimeRegion {
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remediation {
    pub status: Option<String>,
    pub role_arn: Option<String>,
    pub stack_id: Option<String>,
    pub runbook_list: Option<Vec<String>>,
    pub runbook_role_list: Option<Vec<String>>,
    pub policy_to_role_map: Option<HashMap<String, String>>,
    pub external_id: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cost {
    pub status: Option<String>,
    pub role_arn: Option<String>,
    pub external_id: Option<String>,
    pub bucket_arn: Option<String>,
    pub cur_prefix: Option<String>,
}

/// An EKS cluster registered through `createKubernetes`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Kubernetes {
    #[serde(rename = "_id")]
    pub id: String,
    pub display_name: Option<String>,
    pub eks_arn: Option<String>,
    pub status: Option<String>,
    pub collection_token: Option<String>,
    pub creation_date: Option<String>,
}
