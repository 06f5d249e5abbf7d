//! Policy resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::policy::{
    ComplianceMetadata, Policy, PolicyRule, Remediation, RemediationAction, CLOUD_TYPES,
    POLICY_TYPES, SEVERITIES,
};
use crate::poll::poll_until_success;
use crate::util::{
    block_list, bool_attr, resource_data_interface_map, set_or_null, single_block, string_attr,
    string_map_attr, string_map_value, string_or_null, string_set_attr,
};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, NestedBlockBuilder, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "prismacloud_policy";

const KIND: &str = "policy";

#[derive(Default)]
pub struct PolicyResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl PolicyResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a custom policy")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("policy_id")
                .description("Policy ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(
            AttributeBuilder::string("policy_type")
                .required()
                .validator(StringOneOfValidator::create(POLICY_TYPES))
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::string("severity")
                .default(StaticDefault::string("low"))
                .validator(StringOneOfValidator::create(SEVERITIES))
                .build(),
        )
        .attribute(AttributeBuilder::string("recommendation").optional().build())
        .attribute(
            AttributeBuilder::string("cloud_type")
                .optional()
                .computed()
                .validator(StringOneOfValidator::create(CLOUD_TYPES))
                .build(),
        )
        .attribute(AttributeBuilder::string_set("labels").optional().build())
        .attribute(
            AttributeBuilder::bool("enabled")
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(AttributeBuilder::bool("system_default").computed().build())
        .attribute(AttributeBuilder::number("created_on").computed().build())
        .attribute(AttributeBuilder::string("created_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_on").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("rule_last_modified_on").computed().build())
        .attribute(AttributeBuilder::bool("overridden").computed().build())
        .attribute(AttributeBuilder::bool("deleted").computed().build())
        .attribute(AttributeBuilder::number("open_alerts_count").computed().build())
        .attribute(AttributeBuilder::string("owner").computed().build())
        .attribute(AttributeBuilder::string("policy_mode").computed().build())
        .attribute(AttributeBuilder::bool("remediable").computed().build())
        .block(
            NestedBlockBuilder::list("rule")
                .description("The RQL rule the policy evaluates")
                .min_items(1)
                .max_items(1)
                .attribute(AttributeBuilder::string("name").required().build())
                .attribute(AttributeBuilder::string("cloud_type").optional().build())
                .attribute(AttributeBuilder::string("cloud_account").optional().build())
                .attribute(AttributeBuilder::string("resource_type").optional().build())
                .attribute(AttributeBuilder::string("api_name").optional().build())
                .attribute(AttributeBuilder::string("resource_id_path").optional().build())
                .attribute(
                    AttributeBuilder::string("criteria")
                        .description("Saved search ID or RQL query")
                        .required()
                        .build(),
                )
                .attribute(AttributeBuilder::string_map("parameters").required().build())
                .attribute(AttributeBuilder::string("rule_type").required().build())
                .build(),
        )
        .block(
            NestedBlockBuilder::list("remediation")
                .max_items(1)
                .attribute(AttributeBuilder::string("template_type").optional().build())
                .attribute(AttributeBuilder::string("description").optional().build())
                .attribute(
                    AttributeBuilder::string("cli_script_template")
                        .optional()
                        .build(),
                )
                .block(
                    NestedBlockBuilder::list("actions")
                        .attribute(AttributeBuilder::string("operation").optional().build())
                        .attribute(AttributeBuilder::string("payload").optional().build())
                        .build(),
                )
                .build(),
        )
        .block(
            NestedBlockBuilder::set("compliance_metadata")
                .description("Compliance sections this policy is assigned to")
                .attribute(
                    AttributeBuilder::string("compliance_id")
                        .description("Compliance section UUID")
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("custom_assigned")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(AttributeBuilder::string("standard_name").computed().build())
                .attribute(
                    AttributeBuilder::string("standard_description")
                        .computed()
                        .build(),
                )
                .attribute(AttributeBuilder::string("requirement_id").computed().build())
                .attribute(AttributeBuilder::string("requirement_name").computed().build())
                .attribute(AttributeBuilder::string("section_id").computed().build())
                .attribute(
                    AttributeBuilder::string("section_description")
                        .computed()
                        .build(),
                )
                .attribute(AttributeBuilder::string("section_label").computed().build())
                .attribute(AttributeBuilder::string("policy_id").computed().build())
                .build(),
        )
        .build()
}

pub fn parse_policy(value: &DynamicValue) -> Policy {
    let rule = resource_data_interface_map(value, "rule");
    let remediation = resource_data_interface_map(value, "remediation");

    Policy {
        policy_id: string_attr(value, "policy_id"),
        name: string_attr(value, "name"),
        policy_type: string_attr(value, "policy_type"),
        description: string_attr(value, "description"),
        severity: string_attr(value, "severity"),
        recommendation: string_attr(value, "recommendation"),
        cloud_type: string_attr(value, "cloud_type"),
        labels: string_set_attr(value, "labels"),
        enabled: bool_attr(value, "enabled"),
        rule: PolicyRule {
            name: string_attr(&rule, "name"),
            cloud_type: string_attr(&rule, "cloud_type"),
            cloud_account: string_attr(&rule, "cloud_account"),
            resource_type: string_attr(&rule, "resource_type"),
            api_name: string_attr(&rule, "api_name"),
            resource_id_path: string_attr(&rule, "resource_id_path"),
            criteria: string_attr(&rule, "criteria"),
            parameters: string_map_attr(&rule, "parameters"),
            rule_type: string_attr(&rule, "rule_type"),
        },
        remediation: (!remediation.is_empty()).then(|| Remediation {
            template_type: string_attr(&remediation, "template_type"),
            description: string_attr(&remediation, "description"),
            cli_script_template: string_attr(&remediation, "cli_script_template"),
            actions: block_list(&remediation, "actions")
                .iter()
                .map(|action| RemediationAction {
                    operation: string_attr(action, "operation"),
                    payload: string_attr(action, "payload"),
                })
                .collect(),
        }),
        compliance_metadata: block_list(value, "compliance_metadata")
            .iter()
            .map(|item| ComplianceMetadata {
                compliance_id: string_attr(item, "compliance_id"),
                custom_assigned: bool_attr(item, "custom_assigned"),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn rule_value(rule: &PolicyRule) -> Dynamic {
    let mut item = HashMap::new();
    item.insert("name".to_string(), Dynamic::from(rule.name.as_str()));
    item.insert("cloud_type".to_string(), string_or_null(&rule.cloud_type));
    item.insert("cloud_account".to_string(), string_or_null(&rule.cloud_account));
    item.insert("resource_type".to_string(), string_or_null(&rule.resource_type));
    item.insert("api_name".to_string(), string_or_null(&rule.api_name));
    item.insert(
        "resource_id_path".to_string(),
        string_or_null(&rule.resource_id_path),
    );
    item.insert("criteria".to_string(), Dynamic::from(rule.criteria.as_str()));
    item.insert("parameters".to_string(), string_map_value(&rule.parameters));
    item.insert("rule_type".to_string(), Dynamic::from(rule.rule_type.as_str()));
    single_block(item)
}

fn remediation_value(remediation: Option<&Remediation>) -> Dynamic {
    let Some(remediation) = remediation else {
        return Dynamic::List(vec![]);
    };
    let actions = remediation
        .actions
        .iter()
        .map(|action| {
            let mut item = HashMap::new();
            item.insert("operation".to_string(), string_or_null(&action.operation));
            item.insert("payload".to_string(), string_or_null(&action.payload));
            Dynamic::Map(item)
        })
        .collect();

    let mut item = HashMap::new();
    item.insert(
        "template_type".to_string(),
        string_or_null(&remediation.template_type),
    );
    item.insert("description".to_string(), string_or_null(&remediation.description));
    item.insert(
        "cli_script_template".to_string(),
        string_or_null(&remediation.cli_script_template),
    );
    item.insert("actions".to_string(), Dynamic::List(actions));
    single_block(item)
}

fn compliance_metadata_value(meta: &ComplianceMetadata) -> Dynamic {
    let fields = [
        ("compliance_id", &meta.compliance_id),
        ("standard_name", &meta.standard_name),
        ("standard_description", &meta.standard_description),
        ("requirement_id", &meta.requirement_id),
        ("requirement_name", &meta.requirement_name),
        ("section_id", &meta.section_id),
        ("section_description", &meta.section_description),
        ("section_label", &meta.section_label),
        ("policy_id", &meta.policy_id),
    ];
    let mut item: HashMap<String, Dynamic> = fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), Dynamic::from(value.as_str())))
        .collect();
    item.insert("custom_assigned".to_string(), Dynamic::from(meta.custom_assigned));
    Dynamic::Map(item)
}

pub fn save_policy(state: &mut DynamicValue, policy: &Policy) {
    state.set_attribute("id", policy.policy_id.as_str());
    state.set_attribute("policy_id", policy.policy_id.as_str());
    state.set_attribute("name", policy.name.as_str());
    state.set_attribute("policy_type", policy.policy_type.as_str());
    state.set_attribute("description", string_or_null(&policy.description));
    state.set_attribute("severity", policy.severity.as_str());
    state.set_attribute("recommendation", string_or_null(&policy.recommendation));
    state.set_attribute("cloud_type", policy.cloud_type.as_str());
    state.set_attribute("labels", set_or_null(&policy.labels));
    state.set_attribute("enabled", policy.enabled);
    state.set_attribute("rule", rule_value(&policy.rule));
    state.set_attribute("remediation", remediation_value(policy.remediation.as_ref()));
    state.set_attribute(
        "compliance_metadata",
        Dynamic::List(
            policy
                .compliance_metadata
                .iter()
                .map(compliance_metadata_value)
                .collect(),
        ),
    );
    state.set_attribute("system_default", policy.system_default);
    state.set_attribute("created_on", policy.created_on);
    state.set_attribute("created_by", policy.created_by.as_str());
    state.set_attribute("last_modified_on", policy.last_modified_on);
    state.set_attribute("last_modified_by", policy.last_modified_by.as_str());
    state.set_attribute("rule_last_modified_on", policy.rule_last_modified_on);
    state.set_attribute("overridden", policy.overridden);
    state.set_attribute("deleted", policy.deleted);
    state.set_attribute("open_alerts_count", policy.open_alerts_count);
    state.set_attribute("owner", policy.owner.as_str());
    state.set_attribute("policy_mode", policy.policy_mode.as_str());
    state.set_attribute("remediable", policy.remediable);
}

impl PolicyResource {
    async fn create_policy(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let policy = parse_policy(state);
        let api = data.client.policies();

        let created = api.create(&policy).await?;
        let id = match created.filter(|p| !p.policy_id.is_empty()) {
            Some(p) => p.policy_id,
            None => poll_until_success(ctx, &data.poll, || api.identify(&policy.name)).await?,
        };
        state.set_attribute("id", id.as_str());
        state.set_attribute("policy_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_policy(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for PolicyResource {
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

        let result = self.create_policy(&ctx, data, &mut state).await;
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
        let result = data.client.policies().get(&id).await;
        read_response(request.current_state, result, KIND, save_policy)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut policy = parse_policy(&request.planned_state);
        policy.policy_id = string_attr(&request.prior_state, "id");
        let api = data.client.policies();

        let result = match api.update(&policy).await {
            Ok(()) => api.get(&policy.policy_id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_policy,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.policies().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for PolicyResource {
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

    fn configured_policy() -> DynamicValue {
        let mut params = HashMap::new();
        params.insert("savedSearch".to_string(), Dynamic::from("true"));

        let mut rule = HashMap::new();
        rule.insert("name".to_string(), Dynamic::from("public buckets"));
        rule.insert("cloud_type".to_string(), Dynamic::from("aws"));
        rule.insert("cloud_account".to_string(), Dynamic::Null);
        rule.insert("resource_type".to_string(), Dynamic::Null);
        rule.insert("api_name".to_string(), Dynamic::Null);
        rule.insert("resource_id_path".to_string(), Dynamic::Null);
        rule.insert("criteria".to_string(), Dynamic::from("search-1"));
        rule.insert("parameters".to_string(), Dynamic::Map(params));
        rule.insert("rule_type".to_string(), Dynamic::from("Config"));

        let mut value = DynamicValue::empty_object();
        value.set_attribute("name", "no public buckets");
        value.set_attribute("policy_type", "config");
        value.set_attribute("severity", "high");
        value.set_attribute("cloud_type", "aws");
        value.set_attribute("enabled", true);
        value.set_attribute("rule", single_block(rule));
        value.set_attribute("remediation", Dynamic::List(vec![]));
        value
    }

    #[test]
    fn parse_reads_rule_block() {
        let policy = parse_policy(&configured_policy());
        assert_eq!(policy.rule.criteria, "search-1");
        assert_eq!(
            policy.rule.parameters.get("savedSearch").map(String::as_str),
            Some("true")
        );
        assert!(policy.remediation.is_none());
    }

    #[test]
    fn unset_remediation_block_parses_as_none() {
        for unset in [Dynamic::Null, Dynamic::Unknown] {
            let mut config = configured_policy();
            config.set_attribute("remediation", unset);
            assert!(parse_policy(&config).remediation.is_none());
        }

        let mut no_rule = configured_policy();
        no_rule.set_attribute("rule", Dynamic::Null);
        assert_eq!(parse_policy(&no_rule).rule, PolicyRule::default());
    }

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let config = configured_policy();
        let mut echoed = parse_policy(&config);
        echoed.policy_id = "pol-1".to_string();

        let mut state = config.clone();
        save_policy(&mut state, &echoed);

        for name in ["name", "policy_type", "severity", "cloud_type", "rule", "remediation"] {
            assert_eq!(state.attribute(name), config.attribute(name), "{}", name);
        }
        assert_eq!(state.attribute("policy_id").as_str(), Some("pol-1"));
    }

    #[test]
    fn remediation_round_trips() {
        let mut action = HashMap::new();
        action.insert("operation".to_string(), Dynamic::from("buckets.update"));
        action.insert("payload".to_string(), Dynamic::from("{}"));
        let mut remediation = HashMap::new();
        remediation.insert("template_type".to_string(), Dynamic::Null);
        remediation.insert("description".to_string(), Dynamic::from("make it private"));
        remediation.insert(
            "cli_script_template".to_string(),
            Dynamic::from("aws s3api put-bucket-acl"),
        );
        remediation.insert("actions".to_string(), Dynamic::List(vec![Dynamic::Map(action)]));

        let mut config = configured_policy();
        config.set_attribute("remediation", single_block(remediation));

        let parsed = parse_policy(&config);
        assert_eq!(
            remediation_value(parsed.remediation.as_ref()),
            *config.attribute("remediation")
        );
    }
}
