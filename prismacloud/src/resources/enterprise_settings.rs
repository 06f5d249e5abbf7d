//! Enterprise settings resource implementation
//!
//! The settings always exist on the tenant, so create and update both
//! overlay the configured values onto the current settings and post them
//! back. Destroying the resource only forgets it.

use super::{configure_resource, error_diagnostic, not_configured, read_response, ResourceError};
use crate::api::settings::Enterprise;
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::debug;

pub const TYPE_NAME: &str = "prismacloud_enterprise_settings";

/// The settings are a singleton, so the id never changes
pub const SETTINGS_ID: &str = "enterprise_settings";

const KIND: &str = "enterprise settings";

pub const SEVERITIES: &[&str] = &["low", "medium", "high"];

#[derive(Default)]
pub struct EnterpriseSettingsResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl EnterpriseSettingsResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the tenant wide enterprise settings")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::number("session_timeout")
                .description("Minutes of inactivity before a session ends")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("anomaly_training_model_threshold")
                .optional()
                .computed()
                .validator(StringOneOfValidator::create(SEVERITIES))
                .build(),
        )
        .attribute(
            AttributeBuilder::string("anomaly_alert_disposition")
                .optional()
                .computed()
                .validator(StringOneOfValidator::create(&["aggressive", "moderate", "conservative"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("user_attribution_in_notification")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("require_alert_dismissal_note")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "default_policies_enabled",
                AttributeType::map(AttributeType::Bool),
            )
            .description("Severity (low, medium, high) to whether new default policies are enabled")
            .optional()
            .computed()
            .build(),
        )
        .attribute(
            AttributeBuilder::bool("apply_default_policies_enabled")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("access_key_max_validity")
                .description("Maximum access key validity in days, -1 for unlimited")
                .optional()
                .computed()
                .build(),
        )
        .attribute(AttributeBuilder::bool("audit_logs_enabled").optional().computed().build())
        .attribute(AttributeBuilder::bool("alarm_enabled").optional().computed().build())
        .build()
}

fn known(value: &DynamicValue, name: &str) -> Option<Dynamic> {
    let value = value.attribute(name);
    (!value.is_null() && !value.is_unknown()).then(|| value.clone())
}

/// Overlay the values set in configuration onto the current settings
pub fn parse_enterprise_settings(value: &DynamicValue, settings: &mut Enterprise) {
    let int = |name| known(value, name).and_then(|v| v.as_i64());
    let string = |name| known(value, name).and_then(|v| v.as_str().map(str::to_string));
    let boolean = |name| known(value, name).and_then(|v| v.as_bool());

    if let Some(v) = int("session_timeout") {
        settings.session_timeout = v;
    }
    if let Some(v) = string("anomaly_training_model_threshold") {
        settings.anomaly_training_model_threshold = v;
    }
    if let Some(v) = string("anomaly_alert_disposition") {
        settings.anomaly_alert_disposition = v;
    }
    if let Some(v) = boolean("user_attribution_in_notification") {
        settings.user_attribution_in_notification = v;
    }
    if let Some(v) = boolean("require_alert_dismissal_note") {
        settings.require_alert_dismissal_note = v;
    }
    if let Some(map) = known(value, "default_policies_enabled") {
        if let Some(map) = map.as_map() {
            for (severity, enabled) in map {
                if let Some(enabled) = enabled.as_bool() {
                    settings
                        .default_policies_enabled
                        .insert(severity.clone(), enabled);
                }
            }
        }
    }
    if let Some(v) = boolean("apply_default_policies_enabled") {
        settings.apply_default_policies_enabled = v;
    }
    if let Some(v) = int("access_key_max_validity") {
        settings.access_key_max_validity = v;
    }
    if let Some(v) = boolean("audit_logs_enabled") {
        settings.audit_logs_enabled = v;
    }
    if let Some(v) = boolean("alarm_enabled") {
        settings.alarm_enabled = v;
    }
}

pub fn save_enterprise_settings(state: &mut DynamicValue, settings: &Enterprise) {
    state.set_attribute("id", SETTINGS_ID);
    state.set_attribute("session_timeout", settings.session_timeout);
    state.set_attribute(
        "anomaly_training_model_threshold",
        settings.anomaly_training_model_threshold.as_str(),
    );
    state.set_attribute(
        "anomaly_alert_disposition",
        settings.anomaly_alert_disposition.as_str(),
    );
    state.set_attribute(
        "user_attribution_in_notification",
        settings.user_attribution_in_notification,
    );
    state.set_attribute(
        "require_alert_dismissal_note",
        settings.require_alert_dismissal_note,
    );
    state.set_attribute(
        "default_policies_enabled",
        Dynamic::Map(
            settings
                .default_policies_enabled
                .iter()
                .map(|(k, v)| (k.clone(), Dynamic::from(*v)))
                .collect::<HashMap<_, _>>(),
        ),
    );
    state.set_attribute(
        "apply_default_policies_enabled",
        settings.apply_default_policies_enabled,
    );
    state.set_attribute("access_key_max_validity", settings.access_key_max_validity);
    state.set_attribute("audit_logs_enabled", settings.audit_logs_enabled);
    state.set_attribute("alarm_enabled", settings.alarm_enabled);
}

impl EnterpriseSettingsResource {
    async fn apply_settings(
        &self,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let api = data.client.settings();

        let mut settings = api.get_enterprise().await?;
        parse_enterprise_settings(state, &mut settings);
        debug!("Posting enterprise settings");
        api.update_enterprise(&settings).await?;

        let applied = api.get_enterprise().await?;
        save_enterprise_settings(state, &applied);
        Ok(())
    }
}

#[async_trait]
impl Resource for EnterpriseSettingsResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: schema(),
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: state,
                diagnostics: vec![not_configured()],
            };
        };

        state.set_attribute("id", SETTINGS_ID);
        let mut diagnostics = vec![];
        if let Err(e) = self.apply_settings(data, &mut state).await {
            diagnostics.push(error_diagnostic("Failed to update enterprise settings", &e));
        }
        CreateResourceResponse {
            new_state: state,
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let result = data.client.settings().get_enterprise().await;
        read_response(request.current_state, result, KIND, save_enterprise_settings)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut state = request.planned_state;
        match self.apply_settings(data, &mut state).await {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![error_diagnostic("Failed to update enterprise settings", &e)],
            },
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        debug!("Enterprise settings removed from state; the tenant keeps its current values");
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for EnterpriseSettingsResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_settings() -> Enterprise {
        Enterprise {
            session_timeout: 30,
            anomaly_training_model_threshold: "medium".to_string(),
            anomaly_alert_disposition: "moderate".to_string(),
            default_policies_enabled: HashMap::from([
                ("low".to_string(), false),
                ("medium".to_string(), true),
                ("high".to_string(), true),
            ]),
            access_key_max_validity: -1,
            ..Default::default()
        }
    }

    #[test]
    fn parse_only_overlays_configured_values() {
        let mut config = DynamicValue::empty_object();
        config.set_attribute("session_timeout", 60i64);
        config.set_attribute("alarm_enabled", true);
        config.set_attribute("anomaly_alert_disposition", Dynamic::Unknown);
        config.set_attribute(
            "default_policies_enabled",
            Dynamic::Map(HashMap::from([("low".to_string(), Dynamic::from(true))])),
        );

        let mut settings = current_settings();
        parse_enterprise_settings(&config, &mut settings);

        assert_eq!(settings.session_timeout, 60);
        assert!(settings.alarm_enabled);
        assert_eq!(settings.anomaly_alert_disposition, "moderate");
        assert_eq!(settings.anomaly_training_model_threshold, "medium");
        assert_eq!(settings.access_key_max_validity, -1);
        assert_eq!(settings.default_policies_enabled.get("low"), Some(&true));
        assert_eq!(settings.default_policies_enabled.get("high"), Some(&true));
    }

    #[test]
    fn save_uses_constant_id() {
        let mut state = DynamicValue::empty_object();
        save_enterprise_settings(&mut state, &current_settings());

        assert_eq!(state.attribute("id").as_str(), Some(SETTINGS_ID));
        assert_eq!(state.attribute("session_timeout").as_i64(), Some(30));
        assert_eq!(
            state
                .attribute("default_policies_enabled")
                .get("medium")
                .and_then(|v| v.as_bool()),
            Some(true)
        );
    }
}
