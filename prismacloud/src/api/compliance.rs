//! Compliance standard, requirement and section API implementation
//!
//! Creating any of the three returns no body, so callers look the new
//! object up by name (standards, requirements) or section id afterwards.

use super::common::deserialize_null_default;
use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/compliance";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standard {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub system_default: bool,
    #[serde(default, skip_serializing)]
    pub policies_assigned_count: i64,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub cloud_type: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// User facing requirement number, e.g. "1.2"
    #[serde(default)]
    pub requirement_id: String,
    #[serde(default)]
    pub view_order: i64,
    #[serde(default, skip_serializing)]
    pub compliance_id: String,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub system_default: bool,
    #[serde(default, skip_serializing)]
    pub policies_assigned_count: i64,
    #[serde(default, skip_serializing)]
    pub standard_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// User facing section number, e.g. "1.2.3"
    pub section_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub view_order: i64,
    #[serde(default, skip_serializing)]
    pub requirement_id: String,
    #[serde(default, skip_serializing)]
    pub requirement_name: String,
    #[serde(default, skip_serializing)]
    pub standard_name: String,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub system_default: bool,
    #[serde(default, skip_serializing)]
    pub policies_assigned_count: i64,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_null_default")]
    pub associated_policy_ids: Vec<String>,
    #[serde(default, skip_serializing)]
    pub label: String,
}

/// Compliance API, grouping standards, requirements and sections
pub struct ComplianceApi<'a> {
    client: &'a Client,
}

impl<'a> ComplianceApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn standards(&self) -> StandardsApi<'a> {
        StandardsApi {
            client: self.client,
        }
    }

    pub fn requirements(&self) -> RequirementsApi<'a> {
        RequirementsApi {
            client: self.client,
        }
    }

    pub fn sections(&self) -> SectionsApi<'a> {
        SectionsApi {
            client: self.client,
        }
    }
}

pub struct StandardsApi<'a> {
    client: &'a Client,
}

impl StandardsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Standard>, ApiError> {
        self.client.get(API_PATH).await
    }

    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.list()
            .await?
            .into_iter()
            .find(|cs| cs.name == name)
            .map(|cs| cs.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("compliance standard {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<Standard, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, standard: &Standard) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(API_PATH, standard)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, standard: &Standard) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, standard.id), standard)
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

pub struct RequirementsApi<'a> {
    client: &'a Client,
}

impl RequirementsApi<'_> {
    pub async fn list(&self, cs_id: &str) -> Result<Vec<Requirement>, ApiError> {
        self.client
            .get(&format!("{}/{}/requirement", API_PATH, cs_id))
            .await
    }

    pub async fn identify(&self, cs_id: &str, name: &str) -> Result<String, ApiError> {
        self.list(cs_id)
            .await?
            .into_iter()
            .find(|csr| csr.name == name)
            .map(|csr| csr.id)
            .ok_or_else(|| {
                ApiError::ObjectNotFound(format!("compliance requirement {:?}", name))
            })
    }

    pub async fn get(&self, id: &str) -> Result<Requirement, ApiError> {
        self.client
            .get(&format!("{}/requirement/{}", API_PATH, id))
            .await
    }

    pub async fn create(&self, cs_id: &str, requirement: &Requirement) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(&format!("{}/{}/requirement", API_PATH, cs_id), requirement)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, requirement: &Requirement) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(
                &format!("{}/requirement/{}", API_PATH, requirement.id),
                requirement,
            )
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("{}/requirement/{}", API_PATH, id))
            .await
            .map(|_| ())
    }
}

pub struct SectionsApi<'a> {
    client: &'a Client,
}

impl SectionsApi<'_> {
    pub async fn list(&self, csr_id: &str) -> Result<Vec<Section>, ApiError> {
        self.client
            .get(&format!("{}/{}/section", API_PATH, csr_id))
            .await
    }

    /// Find a section's internal id by its user facing section id
    pub async fn identify(&self, csr_id: &str, section_id: &str) -> Result<String, ApiError> {
        self.list(csr_id)
            .await?
            .into_iter()
            .find(|s| s.section_id == section_id)
            .map(|s| s.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("compliance section {:?}", section_id)))
    }

    /// There is no single-section endpoint; the listing is searched instead
    pub async fn get(&self, csr_id: &str, id: &str) -> Result<Section, ApiError> {
        self.list(csr_id)
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("compliance section {}", id)))
    }

    pub async fn create(&self, csr_id: &str, section: &Section) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(&format!("{}/{}/section", API_PATH, csr_id), section)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, csr_id: &str, section: &Section) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(
                &format!("{}/{}/section/{}", API_PATH, csr_id, section.id),
                section,
            )
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, csr_id: &str, id: &str) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("{}/{}/section/{}", API_PATH, csr_id, id))
            .await
            .map(|_| ())
    }
}
