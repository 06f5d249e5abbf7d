//! Alert rule API implementation

use super::common::deserialize_null_default;
use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

const API_PATH: &str = "/alert/rule";

pub const NOTIFICATION_FREQUENCIES: &[&str] = &["as_it_happens", "daily", "weekly", "monthly"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_scan_config_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub scan_all: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub policies: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub policy_labels: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub excluded_policies: Vec<String>,
    #[serde(default)]
    pub target: AlertTarget,
    #[serde(default)]
    pub allow_auto_remediate: bool,
    #[serde(default)]
    pub delay_notification_ms: i64,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub notification_config: Vec<NotificationConfig>,
    #[serde(default)]
    pub notify_on_open: bool,
    #[serde(default)]
    pub notify_on_snoozed: bool,
    #[serde(default)]
    pub notify_on_dismissed: bool,
    #[serde(default)]
    pub notify_on_resolved: bool,
    #[serde(default, skip_serializing)]
    pub owner: String,
    #[serde(default, skip_serializing)]
    pub open_alerts_count: i64,
    #[serde(default, skip_serializing)]
    pub read_only: bool,
    #[serde(default, skip_serializing)]
    pub deleted: bool,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTarget {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub account_groups: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub excluded_accounts: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub regions: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tags: Vec<TargetTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetTag {
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub detailed_report: bool,
    #[serde(default)]
    pub with_compression: bool,
    #[serde(default)]
    pub include_remediation: bool,
    #[serde(rename = "type", default)]
    pub config_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Timezone>,
    #[serde(default)]
    pub day_of_month: i64,
    #[serde(default)]
    pub hour_of_day: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rrule_schedule: String,
    #[serde(default, skip_serializing)]
    pub last_updated: i64,
    #[serde(default, skip_serializing)]
    pub last_sent_ts: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timezone {
    #[serde(default)]
    pub id: String,
}

pub struct AlertRulesApi<'a> {
    client: &'a Client,
}

impl<'a> AlertRulesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<AlertRule>, ApiError> {
        self.client.get(API_PATH).await
    }

    /// Find an alert rule id by name
    pub async fn identify(&self, name: &str) -> Result<String, ApiError> {
        self.list()
            .await?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.policy_scan_config_id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("alert rule {:?}", name)))
    }

    pub async fn get(&self, id: &str) -> Result<AlertRule, ApiError> {
        self.client.get(&format!("{}/{}", API_PATH, id)).await
    }

    pub async fn create(&self, rule: &AlertRule) -> Result<Option<AlertRule>, ApiError> {
        self.client.post(API_PATH, rule).await
    }

    pub async fn update(&self, rule: &AlertRule) -> Result<(), ApiError> {
        self.client
            .put::<IgnoredAny, _>(
                &format!("{}/{}", API_PATH, rule.policy_scan_config_id),
                rule,
            )
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
