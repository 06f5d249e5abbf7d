//! Policy API implementation

use super::common::deserialize_null_default;
use super::{ApiError, ApiQueryParams, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const API_PATH: &str = "/policy";

pub const SEVERITIES: &[&str] = &["low", "medium", "high"];
pub const POLICY_TYPES: &[&str] = &[
    "config",
    "audit_event",
    "network",
    "anomaly",
    "data",
    "iam",
];
pub const CLOUD_TYPES: &[&str] = &["aws", "azure", "gcp", "alibaba_cloud", "oci", "all"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_id: String,
    pub name: String,
    #[serde(default)]
    pub policy_type: String,
    #[serde(default, skip_serializing)]
    pub system_default: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    pub rule: PolicyRule,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_type: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub compliance_metadata: Vec<ComplianceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub rule_last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub overridden: bool,
    #[serde(default, skip_serializing)]
    pub deleted: bool,
    #[serde(default, skip_serializing)]
    pub open_alerts_count: i64,
    #[serde(default, skip_serializing)]
    pub owner: String,
    #[serde(default, skip_serializing)]
    pub policy_mode: String,
    #[serde(default, skip_serializing)]
    pub remediable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_account: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id_path: String,
    #[serde(default)]
    pub criteria: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub rule_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceMetadata {
    #[serde(default)]
    pub standard_name: String,
    #[serde(default)]
    pub standard_description: String,
    #[serde(default)]
    pub requirement_id: String,
    #[serde(default)]
    pub requirement_name: String,
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub section_description: String,
    #[serde(default)]
    pub policy_id: String,
    #[serde(default)]
    pub compliance_id: String,
    #[serde(default)]
    pub section_label: String,
    #[serde(default)]
    pub custom_assigned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cli_script_template: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub actions: Vec<RemediationAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub payload: String,
}

pub struct PoliciesApi<'a> {
    client: &'a Client,
}

impl<'a> PoliciesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List policies; `filters` are passed through as query parameters,
    /// e.g. `policy.severity=high`
    pub async fn list(&self, filters: &HashMap<String, String>) -> Result<Vec<Policy>, ApiError> {
        let mut keys: Vec<_> = filters.keys().collect();
        keys.sort();
        let params = keys
            .into_iter()
            .fold(ApiQueryParams::new(), |params, key| {
                params.add(key.as_str(), &filters[key])
            });
        self.client.get_with_params(API_PATH, &params).await
    }

    /// Find a policy id by name
    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        let filters = HashMap::from([("policy.name".to_string(), name.to_string())]);
        self.list(&filters)
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.policy_id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("policy {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<Policy, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, policy: &Policy) -> Result<Option<Policy>, ApiError> {
        self.client.post(API_PATH, policy).await
    }

    pub async fn update(&self, policy: &Policy) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, policy.policy_id), policy)
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("{}/{}", API_PATH, id))
            .await
            .map(|_| ())
    }
}
