//! Enterprise settings API implementation

use super::{ApiError, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const API_PATH: &str = "/settings/enterprise";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enterprise {
    /// Minutes of inactivity before a session ends
    #[serde(default)]
    pub session_timeout: i64,
    #[serde(default)]
    pub anomaly_training_model_threshold: String,
    #[serde(default)]
    pub anomaly_alert_disposition: String,
    #[serde(default)]
    pub user_attribution_in_notification: bool,
    #[serde(default)]
    pub require_alert_dismissal_note: bool,
    /// Severity level ("low", "medium", "high") to enabled flag
    #[serde(default)]
    pub default_policies_enabled: HashMap<String, bool>,
    #[serde(default)]
    pub apply_default_policies_enabled: bool,
    #[serde(default)]
    pub access_key_max_validity: i64,
    #[serde(default)]
    pub audit_logs_enabled: bool,
    #[serde(default)]
    pub alarm_enabled: bool,
}

pub struct SettingsApi<'a> {
    client: &'a Client,
}

impl<'a> SettingsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_enterprise(&self) -> Result<Enterprise, ApiError> {
        self.client.get(API_PATH).await
    }

    pub async fn update_enterprise(&self, settings: &Enterprise) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(API_PATH, settings)
            .await
            .map(|_| ())
    }
}
