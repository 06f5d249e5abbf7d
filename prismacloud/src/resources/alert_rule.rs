//! Alert rule resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::alert_rule::{
    AlertRule, AlertTarget, NotificationConfig, TargetTag, Timezone, NOTIFICATION_FREQUENCIES,
};
use crate::poll::poll_until_success;
use crate::util::{
    block_first, block_list, bool_attr, int_attr, set_or_null, single_block, string_attr,
    string_or_null, string_set_attr, Attributes,
};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, NestedBlockBuilder, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "prismacloud_alert_rule";

const KIND: &str = "alert rule";

#[derive(Default)]
pub struct AlertRuleResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AlertRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages an alert rule, which ties policies to the accounts they alert on")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("policy_scan_config_id")
                .description("Alert rule ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::bool("enabled")
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("scan_all")
                .description("Scan all policies")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::string_set("policies")
                .description("Policy IDs evaluated by this rule")
                .optional()
                .build(),
        )
        .attribute(AttributeBuilder::string_set("policy_labels").optional().build())
        .attribute(AttributeBuilder::string_set("excluded_policies").optional().build())
        .attribute(
            AttributeBuilder::bool("allow_auto_remediate")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::number("delay_notification_ms")
                .default(StaticDefault::number(0.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("notify_on_open")
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("notify_on_snoozed")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("notify_on_dismissed")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("notify_on_resolved")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(AttributeBuilder::string("owner").computed().build())
        .attribute(AttributeBuilder::number("open_alerts_count").computed().build())
        .attribute(AttributeBuilder::bool("read_only").computed().build())
        .attribute(AttributeBuilder::number("last_modified_on").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .block(
            NestedBlockBuilder::list("target")
                .description("Accounts and regions the rule applies to")
                .min_items(1)
                .max_items(1)
                .attribute(AttributeBuilder::string_set("account_groups").optional().build())
                .attribute(
                    AttributeBuilder::string_set("excluded_accounts")
                        .optional()
                        .build(),
                )
                .attribute(AttributeBuilder::string_set("regions").optional().build())
                .block(
                    NestedBlockBuilder::list("tags")
                        .attribute(AttributeBuilder::string("key").required().build())
                        .attribute(AttributeBuilder::string_set("values").optional().build())
                        .build(),
                )
                .build(),
        )
        .block(
            NestedBlockBuilder::list("notification_config")
                .description("Where and how often notifications are sent")
                .attribute(
                    AttributeBuilder::string("config_id")
                        .computed()
                        .plan_modifier(UseStateForUnknown::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::string("type")
                        .description("Integration type, e.g. email or slack")
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::string("frequency")
                        .optional()
                        .validator(StringOneOfValidator::create(NOTIFICATION_FREQUENCIES))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("enabled")
                        .default(StaticDefault::bool(true))
                        .build(),
                )
                .attribute(AttributeBuilder::string_set("recipients").optional().build())
                .attribute(
                    AttributeBuilder::bool("detailed_report")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("with_compression")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("include_remediation")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(AttributeBuilder::string("template_id").optional().build())
                .attribute(AttributeBuilder::string("timezone").optional().build())
                .attribute(AttributeBuilder::number("day_of_month").optional().build())
                .attribute(AttributeBuilder::number("hour_of_day").optional().build())
                .attribute(AttributeBuilder::string("rrule_schedule").optional().build())
                .attribute(AttributeBuilder::number("last_updated").computed().build())
                .attribute(AttributeBuilder::number("last_sent_ts").computed().build())
                .build(),
        )
        .build()
}

fn parse_notification_config(item: &HashMap<String, Dynamic>) -> NotificationConfig {
    let timezone = string_attr(item, "timezone");
    NotificationConfig {
        id: string_attr(item, "config_id"),
        frequency: string_attr(item, "frequency"),
        enabled: bool_attr(item, "enabled"),
        recipients: string_set_attr(item, "recipients"),
        detailed_report: bool_attr(item, "detailed_report"),
        with_compression: bool_attr(item, "with_compression"),
        include_remediation: bool_attr(item, "include_remediation"),
        config_type: string_attr(item, "type"),
        template_id: string_attr(item, "template_id"),
        timezone: (!timezone.is_empty()).then_some(Timezone { id: timezone }),
        day_of_month: int_attr(item, "day_of_month"),
        hour_of_day: int_attr(item, "hour_of_day"),
        rrule_schedule: string_attr(item, "rrule_schedule"),
        ..Default::default()
    }
}

fn parse_target(target: &impl Attributes) -> AlertTarget {
    AlertTarget {
        account_groups: string_set_attr(target, "account_groups"),
        excluded_accounts: string_set_attr(target, "excluded_accounts"),
        regions: string_set_attr(target, "regions"),
        tags: block_list(target, "tags")
            .iter()
            .map(|tag| TargetTag {
                key: string_attr(tag, "key"),
                values: string_set_attr(tag, "values"),
            })
            .collect(),
    }
}

pub fn parse_alert_rule(value: &DynamicValue) -> AlertRule {
    AlertRule {
        policy_scan_config_id: string_attr(value, "policy_scan_config_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        enabled: bool_attr(value, "enabled"),
        scan_all: bool_attr(value, "scan_all"),
        policies: string_set_attr(value, "policies"),
        policy_labels: string_set_attr(value, "policy_labels"),
        excluded_policies: string_set_attr(value, "excluded_policies"),
        target: parse_target(&block_first(value, "target")),
        allow_auto_remediate: bool_attr(value, "allow_auto_remediate"),
        delay_notification_ms: int_attr(value, "delay_notification_ms"),
        notification_config: block_list(value, "notification_config")
            .iter()
            .map(parse_notification_config)
            .collect(),
        notify_on_open: bool_attr(value, "notify_on_open"),
        notify_on_snoozed: bool_attr(value, "notify_on_snoozed"),
        notify_on_dismissed: bool_attr(value, "notify_on_dismissed"),
        notify_on_resolved: bool_attr(value, "notify_on_resolved"),
        ..Default::default()
    }
}

fn non_zero(value: i64) -> Dynamic {
    if value == 0 {
        Dynamic::Null
    } else {
        Dynamic::from(value)
    }
}

fn notification_config_value(config: &NotificationConfig) -> Dynamic {
    let mut item = HashMap::new();
    item.insert("config_id".to_string(), Dynamic::from(config.id.as_str()));
    item.insert("type".to_string(), Dynamic::from(config.config_type.as_str()));
    item.insert("frequency".to_string(), string_or_null(&config.frequency));
    item.insert("enabled".to_string(), Dynamic::from(config.enabled));
    item.insert("recipients".to_string(), set_or_null(&config.recipients));
    item.insert("detailed_report".to_string(), Dynamic::from(config.detailed_report));
    item.insert("with_compression".to_string(), Dynamic::from(config.with_compression));
    item.insert(
        "include_remediation".to_string(),
        Dynamic::from(config.include_remediation),
    );
    item.insert("template_id".to_string(), string_or_null(&config.template_id));
    item.insert(
        "timezone".to_string(),
        config
            .timezone
            .as_ref()
            .map(|tz| string_or_null(&tz.id))
            .unwrap_or(Dynamic::Null),
    );
    item.insert("day_of_month".to_string(), non_zero(config.day_of_month));
    item.insert("hour_of_day".to_string(), non_zero(config.hour_of_day));
    item.insert("rrule_schedule".to_string(), string_or_null(&config.rrule_schedule));
    item.insert("last_updated".to_string(), Dynamic::from(config.last_updated));
    item.insert("last_sent_ts".to_string(), Dynamic::from(config.last_sent_ts));
    Dynamic::Map(item)
}

pub(crate) fn target_value(target: &AlertTarget) -> Dynamic {
    let tags = target
        .tags
        .iter()
        .map(|tag| {
            let mut item = HashMap::new();
            item.insert("key".to_string(), Dynamic::from(tag.key.as_str()));
            item.insert("values".to_string(), set_or_null(&tag.values));
            Dynamic::Map(item)
        })
        .collect();

    let mut item = HashMap::new();
    item.insert("account_groups".to_string(), set_or_null(&target.account_groups));
    item.insert(
        "excluded_accounts".to_string(),
        set_or_null(&target.excluded_accounts),
    );
    item.insert("regions".to_string(), set_or_null(&target.regions));
    item.insert("tags".to_string(), Dynamic::List(tags));
    single_block(item)
}

pub fn save_alert_rule(state: &mut DynamicValue, rule: &AlertRule) {
    state.set_attribute("id", rule.policy_scan_config_id.as_str());
    state.set_attribute("policy_scan_config_id", rule.policy_scan_config_id.as_str());
    state.set_attribute("name", rule.name.as_str());
    state.set_attribute("description", string_or_null(&rule.description));
    state.set_attribute("enabled", rule.enabled);
    state.set_attribute("scan_all", rule.scan_all);
    // With scan_all the API fills in every policy; keep what was configured
    if !rule.scan_all {
        state.set_attribute("policies", set_or_null(&rule.policies));
    } else if state.attribute("policies").is_unknown() {
        state.set_attribute("policies", Dynamic::Null);
    }
    state.set_attribute("policy_labels", set_or_null(&rule.policy_labels));
    state.set_attribute("excluded_policies", set_or_null(&rule.excluded_policies));
    state.set_attribute("target", target_value(&rule.target));
    state.set_attribute("allow_auto_remediate", rule.allow_auto_remediate);
    state.set_attribute("delay_notification_ms", rule.delay_notification_ms);
    state.set_attribute(
        "notification_config",
        Dynamic::List(
            rule.notification_config
                .iter()
                .map(notification_config_value)
                .collect(),
        ),
    );
    state.set_attribute("notify_on_open", rule.notify_on_open);
    state.set_attribute("notify_on_snoozed", rule.notify_on_snoozed);
    state.set_attribute("notify_on_dismissed", rule.notify_on_dismissed);
    state.set_attribute("notify_on_resolved", rule.notify_on_resolved);
    state.set_attribute("owner", rule.owner.as_str());
    state.set_attribute("open_alerts_count", rule.open_alerts_count);
    state.set_attribute("read_only", rule.read_only);
    state.set_attribute("last_modified_on", rule.last_modified_on);
    state.set_attribute("last_modified_by", rule.last_modified_by.as_str());
}

impl AlertRuleResource {
    async fn create_alert_rule(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let rule = parse_alert_rule(state);
        if !rule.scan_all && rule.policies.is_empty() && rule.policy_labels.is_empty() {
            return Err(ResourceError::Invalid(
                "policies or policy_labels must be set when scan_all is false".to_string(),
            ));
        }
        let api = data.client.alert_rules();

        let created = api.create(&rule).await?;
        let id = match created.filter(|r| !r.policy_scan_config_id.is_empty()) {
            Some(r) => r.policy_scan_config_id,
            None => poll_until_success(ctx, &data.poll, || api.identify(&rule.name)).await?,
        };
        state.set_attribute("id", id.as_str());
        state.set_attribute("policy_scan_config_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_alert_rule(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for AlertRuleResource {
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

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: state,
                diagnostics: vec![not_configured()],
            };
        };

        let result = self.create_alert_rule(&ctx, data, &mut state).await;
        create_response(state, result, KIND)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.current_state, "id");
        let result = data.client.alert_rules().get(&id).await;
        read_response(request.current_state, result, KIND, save_alert_rule)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut rule = parse_alert_rule(&request.planned_state);
        rule.policy_scan_config_id = string_attr(&request.prior_state, "id");
        let api = data.client.alert_rules();

        let result = match api.update(&rule).await {
            Ok(()) => api.get(&rule.policy_scan_config_id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_alert_rule,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.alert_rules().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for AlertRuleResource {
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
    use crate::util::string_slice_to_set;

    fn configured_rule() -> DynamicValue {
        let mut tag = HashMap::new();
        tag.insert("key".to_string(), Dynamic::from("env"));
        tag.insert(
            "values".to_string(),
            string_slice_to_set(&["prod".to_string()]),
        );

        let mut target = HashMap::new();
        target.insert(
            "account_groups".to_string(),
            string_slice_to_set(&["ag-1".to_string()]),
        );
        target.insert("excluded_accounts".to_string(), Dynamic::Null);
        target.insert("regions".to_string(), Dynamic::Null);
        target.insert("tags".to_string(), Dynamic::List(vec![Dynamic::Map(tag)]));

        let mut value = DynamicValue::empty_object();
        value.set_attribute("name", "critical alerts");
        value.set_attribute("enabled", true);
        value.set_attribute("scan_all", false);
        value.set_attribute("policies", string_slice_to_set(&["p-1".to_string()]));
        value.set_attribute("target", single_block(target));
        value
    }

    #[test]
    fn parse_reads_target_block() {
        let rule = parse_alert_rule(&configured_rule());
        assert_eq!(rule.name, "critical alerts");
        assert_eq!(rule.target.account_groups, vec!["ag-1"]);
        assert_eq!(rule.target.tags.len(), 1);
        assert_eq!(rule.target.tags[0].values, vec!["prod"]);
    }

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let config = configured_rule();
        let mut echoed = parse_alert_rule(&config);
        echoed.policy_scan_config_id = "rule-1".to_string();

        let mut state = config.clone();
        save_alert_rule(&mut state, &echoed);

        assert_eq!(state.attribute("id").as_str(), Some("rule-1"));
        assert_eq!(state.attribute("policies"), config.attribute("policies"));
        assert_eq!(state.attribute("target"), config.attribute("target"));
        assert!(state.attribute("description").is_null());
    }

    #[test]
    fn scan_all_keeps_configured_policies() {
        let mut config = configured_rule();
        config.set_attribute("scan_all", true);
        config.set_attribute("policies", Dynamic::Null);

        let mut echoed = parse_alert_rule(&config);
        echoed.policies = vec!["p-1".to_string(), "p-2".to_string()];

        let mut state = config.clone();
        save_alert_rule(&mut state, &echoed);
        assert!(state.attribute("policies").is_null());
    }

    #[test]
    fn notification_timezone_round_trips() {
        let mut item = HashMap::new();
        item.insert("type".to_string(), Dynamic::from("email"));
        item.insert("timezone".to_string(), Dynamic::from("UTC"));
        item.insert("day_of_month".to_string(), Dynamic::from(3i64));

        let parsed = parse_notification_config(&item);
        assert_eq!(parsed.timezone, Some(Timezone { id: "UTC".to_string() }));

        let value = notification_config_value(&parsed);
        assert_eq!(value.get("timezone"), Some(&Dynamic::from("UTC")));
        assert_eq!(value.get("day_of_month"), Some(&Dynamic::from(3i64)));
        assert_eq!(value.get("hour_of_day"), Some(&Dynamic::Null));
    }
}
