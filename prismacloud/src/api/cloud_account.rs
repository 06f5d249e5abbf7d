//! Cloud account API implementation
//!
//! Each cloud has its own onboarding payload. AWS and Alibaba Cloud send a
//! flat object, Azure and GCP wrap the shared fields in `cloudAccount`.

use super::common::deserialize_null_default;
use super::{ApiError, ApiQueryParams, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

pub const TYPE_AWS: &str = "aws";
pub const TYPE_AZURE: &str = "azure";
pub const TYPE_GCP: &str = "gcp";
pub const TYPE_ALIBABA: &str = "alibaba_cloud";

pub const CLOUD_TYPES: &[&str] = &[TYPE_AWS, TYPE_AZURE, TYPE_GCP, TYPE_ALIBABA];

/// Fields shared by every cloud, nested under `cloudAccount` for Azure and GCP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBase {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAccount {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub external_id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protection_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAccount {
    #[serde(rename = "cloudAccount", default)]
    pub account: AccountBase,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default)]
    pub monitor_flow_logs: bool,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub service_principal_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpAccount {
    #[serde(rename = "cloudAccount", default)]
    pub account: AccountBase,
    #[serde(default)]
    pub compression_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_flow_enabled_project: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow_log_storage_bucket: String,
    /// Service account key file contents
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub credentials: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlibabaAccount {
    #[serde(default)]
    pub account_id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ram_arn: String,
    #[serde(default)]
    pub enabled: bool,
}

/// A cloud account of any supported cloud
#[derive(Debug, Clone, PartialEq)]
pub enum CloudAccount {
    Aws(AwsAccount),
    Azure(AzureAccount),
    Gcp(GcpAccount),
    Alibaba(AlibabaAccount),
}

impl CloudAccount {
    pub fn cloud_type(&self) -> &'static str {
        match self {
            CloudAccount::Aws(_) => TYPE_AWS,
            CloudAccount::Azure(_) => TYPE_AZURE,
            CloudAccount::Gcp(_) => TYPE_GCP,
            CloudAccount::Alibaba(_) => TYPE_ALIBABA,
        }
    }

    pub fn account_id(&self) -> &str {
        match self {
            CloudAccount::Aws(a) => &a.account_id,
            CloudAccount::Azure(a) => &a.account.account_id,
            CloudAccount::Gcp(a) => &a.account.account_id,
            CloudAccount::Alibaba(a) => &a.account_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CloudAccount::Aws(a) => &a.name,
            CloudAccount::Azure(a) => &a.account.name,
            CloudAccount::Gcp(a) => &a.account.name,
            CloudAccount::Alibaba(a) => &a.name,
        }
    }

    fn to_body(&self) -> Result<serde_json::Value, ApiError> {
        let body = match self {
            CloudAccount::Aws(a) => serde_json::to_value(a),
            CloudAccount::Azure(a) => serde_json::to_value(a),
            CloudAccount::Gcp(a) => serde_json::to_value(a),
            CloudAccount::Alibaba(a) => serde_json::to_value(a),
        };
        body.map_err(|e| ApiError::ParseError(e.to_string()))
    }

    fn from_body(cloud_type: &str, body: serde_json::Value) -> Result<Self, ApiError> {
        let parsed = match cloud_type {
            TYPE_AWS => serde_json::from_value(body).map(CloudAccount::Aws),
            TYPE_AZURE => serde_json::from_value(body).map(CloudAccount::Azure),
            TYPE_GCP => serde_json::from_value(body).map(CloudAccount::Gcp),
            TYPE_ALIBABA => serde_json::from_value(body).map(CloudAccount::Alibaba),
            other => return Err(ApiError::ParseError(format!("unknown cloud type {:?}", other))),
        };
        parsed.map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

/// Row of the account listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cloud_type: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub last_modified_by: String,
    #[serde(default)]
    pub last_modified_ts: i64,
    #[serde(default)]
    pub deployment_type: String,
    #[serde(default)]
    pub protection_mode: String,
    #[serde(default)]
    pub storage_scan_enabled: bool,
    #[serde(default)]
    pub ingestion_mode: i64,
    #[serde(default)]
    pub number_of_child_accounts: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountName {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cloud_type: String,
}

pub struct CloudAccountsApi<'a> {
    client: &'a Client,
}

impl<'a> CloudAccountsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<AccountSummary>, ApiError> {
        self.client
            .get_with_params("/cloud", &ApiQueryParams::new().add("excludeAccountGroupDetails", true))
            .await
    }

    pub async fn names(&self, cloud_type: Option<&str>) -> Result<Vec<AccountName>, ApiError> {
        let params = ApiQueryParams::new().add_optional("cloudType", cloud_type);
        self.client.get_with_params("/cloud/name", &params).await
    }

    /// Find an account id by cloud type and name
    pub async fn identify(&self, cloud_type: &str, name: &str) -> Result<String, ApiError> {
        self.names(Some(cloud_type))
            .await?
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
            .ok_or_else(|| {
                ApiError::ObjectNotFound(format!("{} cloud account {:?}", cloud_type, name))
            })
    }

    pub async fn get(&self, cloud_type: &str, id: &str) -> Result<CloudAccount, ApiError> {
        let body: serde_json::Value = self
            .client
            .get(&format!("/cloud/{}/{}", cloud_type, id))
            .await?;
        CloudAccount::from_body(cloud_type, body)
    }

    pub async fn create(&self, account: &CloudAccount) -> Result<(), ApiError> {
        let body = account.to_body()?;
        self.client
            .post::<IgnoredAny, _>(&format!("/cloud/{}", account.cloud_type()), &body)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, account: &CloudAccount) -> Result<(), ApiError> {
        let body = account.to_body()?;
        self.client
            .put::<IgnoredAny, _>(
                &format!("/cloud/{}/{}", account.cloud_type(), account.account_id()),
                &body,
            )
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, cloud_type: &str, id: &str) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("/cloud/{}/{}", cloud_type, id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_body_wraps_shared_fields() {
        let account = CloudAccount::Azure(AzureAccount {
            account: AccountBase {
                account_id: "sub-1".to_string(),
                enabled: true,
                name: "prod".to_string(),
                ..Default::default()
            },
            client_id: "client".to_string(),
            tenant_id: "tenant".to_string(),
            ..Default::default()
        });

        let body = account.to_body().unwrap();
        assert_eq!(body["cloudAccount"]["accountId"], "sub-1");
        assert_eq!(body["clientId"], "client");
        assert!(body.get("key").is_none());
        assert_eq!(account.account_id(), "sub-1");
    }

    #[test]
    fn aws_body_is_flat() {
        let body = serde_json::json!({
            "accountId": "123",
            "enabled": true,
            "externalId": "ext",
            "groupIds": null,
            "name": "aws-prod",
            "roleArn": "arn:aws:iam::123:role/x"
        });
        let account = CloudAccount::from_body(TYPE_AWS, body).unwrap();
        match account {
            CloudAccount::Aws(aws) => {
                assert_eq!(aws.role_arn, "arn:aws:iam::123:role/x");
                assert!(aws.group_ids.is_empty());
            }
            other => panic!("unexpected account {:?}", other),
        }
    }

    #[test]
    fn unknown_cloud_type_is_rejected() {
        assert!(CloudAccount::from_body("oci", serde_json::json!({})).is_err());
    }
}
