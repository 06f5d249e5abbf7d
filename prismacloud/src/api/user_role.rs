//! User role API implementation

use super::common::{deserialize_null_default, NameId};
use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/user/role";

pub const ROLE_TYPES: &[&str] = &[
    "System Admin",
    "Account Group Admin",
    "Account Group Read Only",
    "Cloud Provisioning Admin",
    "Account and Cloud Provisioning Admin",
    "Build and Deploy Security",
    "Developer",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role_type: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub account_group_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub resource_list_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub code_repository_ids: Vec<String>,
    #[serde(default)]
    pub restrict_dismissal_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_attributes: Option<AdditionalAttributes>,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub associated_users: Vec<String>,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub account_groups: Vec<NameId>,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_ts: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalAttributes {
    #[serde(default)]
    pub only_allow_ci_access: bool,
    #[serde(default)]
    pub only_allow_compute_access: bool,
    #[serde(default)]
    pub only_allow_read_access: bool,
    #[serde(default)]
    pub has_defender_permissions: bool,
}

pub struct UserRolesApi<'a> {
    client: &'a Client,
}

impl<'a> UserRolesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Role>, ApiError> {
        self.client.get(API_PATH).await
    }

    pub async fn names(&self) -> Result<Vec<NameId>, ApiError> {
        self.client.get(&format!("{}/name", API_PATH)).await
    }

    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.names()
            .await?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("user role {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<Role, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, role: &Role) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(API_PATH, role)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, role: &Role) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, role.id), role)
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
