//! Account group API implementation

use super::common::{deserialize_null_default, NameId};
use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/cloud/group";

/// Account group as returned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub account_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub child_group_ids: Vec<String>,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_ts: i64,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub accounts: Vec<GroupAccount>,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub alert_rules: Vec<GroupAlertRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAlertRule {
    #[serde(default)]
    pub alert_id: String,
    #[serde(default)]
    pub alert_name: String,
}

pub struct AccountGroupsApi<'a> {
    client: &'a Client,
}

impl<'a> AccountGroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<AccountGroup>, ApiError> {
        self.client.get(API_PATH).await
    }

    pub async fn names(&self) -> Result<Vec<NameId>, ApiError> {
        self.client.get(&format!("{}/name", API_PATH)).await
    }

    /// Find an account group id by name
    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.names()
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .map(|g| g.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("account group {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<AccountGroup, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    /// Create a group; the API answers with the stored group or nothing
    pub async fn create(&self, group: &AccountGroup) -> Result<Option<AccountGroup>, ApiError> {
        self.client.post(API_PATH, group).await
    }

    pub async fn update(&self, group: &AccountGroup) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, group.id), group)
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
