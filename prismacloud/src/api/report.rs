//! Report API implementation

use super::common::{deserialize_null_default, TimeRange};
use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/report";

pub const REPORT_TYPES: &[&str] = &["RIS", "COMPLIANCE_STANDARD", "CLOUD_SECURITY_ASSESSMENT"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub report_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compliance_standard_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
    #[serde(default)]
    pub target: ReportTarget,
    #[serde(default, skip_serializing)]
    pub status: String,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub next_schedule: i64,
    #[serde(default, skip_serializing)]
    pub last_scheduled_on: i64,
    #[serde(default, skip_serializing)]
    pub total_instance_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTarget {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub account_groups: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub accounts: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub regions: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub compliance_standard_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub notify_to: Vec<String>,
    #[serde(default)]
    pub schedule_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schedule: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time_zone: String,
    #[serde(default)]
    pub download_now: bool,
}

pub struct ReportsApi<'a> {
    client: &'a Client,
}

impl<'a> ReportsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Report>, ApiError> {
        self.client.get(API_PATH).await
    }

    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.list()
            .await?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("report {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<Report, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, report: &Report) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(API_PATH, report)
            .await
            .map(|_| ())
    }

    pub async fn update(&self, report: &Report) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(&format!("{}/{}", API_PATH, report.id), report)
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
