//! Integration API implementation

use super::common::deserialize_null_default;
use super::{ApiError, ApiQueryParams, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/integration";

pub const INTEGRATION_TYPES: &[&str] = &[
    "amazon_sqs",
    "amazon_security_hub",
    "aws_s3",
    "azure_service_bus_queue",
    "email",
    "google_cscc",
    "jira",
    "microsoft_teams",
    "okta_idp",
    "pager_duty",
    "qualys",
    "service_now",
    "slack",
    "splunk",
    "tenable",
    "webhook",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub integration_type: String,
    #[serde(default)]
    pub integration_config: IntegrationConfig,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub created_ts: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_ts: i64,
    #[serde(default, skip_serializing)]
    pub status: String,
    #[serde(default, skip_serializing)]
    pub valid: bool,
    #[serde(default, skip_serializing)]
    pub reason: Option<Reason>,
}

/// Union of the settings of every integration type; unused fields are
/// left out of the request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub queue_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub more_info: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub integration_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub org_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "deserialize_null_default")]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "deserialize_null_default")]
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub read_only: bool,
}

/// Why the last use of an integration failed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    #[serde(default)]
    pub last_used: i64,
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

pub struct IntegrationsApi<'a> {
    client: &'a Client,
}

impl<'a> IntegrationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, integration_type: Option<&str>) -> Result<Vec<Integration>, ApiError> {
        let params = ApiQueryParams::new().add_optional("type", integration_type);
        self.client.get_with_params(API_PATH, &params).await
    }

    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.list(None)
            .await?
            .into_iter()
            .find(|i| i.name == name)
            .map(|i| i.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("integration {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<Integration, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, integration: &Integration) -> Result<Option<Integration>, ApiError> {
        self.client.post(API_PATH, integration).await
    }

    pub async fn update(&self, integration: &Integration) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, integration.id), integration)
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
