//! Report resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, parse_time_range,
    read_response, time_range_block, time_range_value, update_response, ResourceError,
};
use crate::api::report::{Report, ReportTarget, REPORT_TYPES};
use crate::poll::poll_until_success;
use crate::util::{
    block_first, bool_attr, set_or_null, single_block, string_attr, string_or_null,
    string_set_attr,
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

pub const TYPE_NAME: &str = "prismacloud_report";

const KIND: &str = "report";

#[derive(Default)]
pub struct ReportResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ReportResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a scheduled or one-off compliance report")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("report_id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(
            AttributeBuilder::string("report_type")
                .default(StaticDefault::string("RIS"))
                .validator(StringOneOfValidator::create(REPORT_TYPES))
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("cloud_type").required().build())
        .attribute(
            AttributeBuilder::string("compliance_standard_id")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("locale")
                .default(StaticDefault::string("en"))
                .build(),
        )
        .attribute(AttributeBuilder::string("status").computed().build())
        .attribute(AttributeBuilder::number("created_on").computed().build())
        .attribute(AttributeBuilder::string("created_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_on").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("next_schedule").computed().build())
        .attribute(AttributeBuilder::number("last_scheduled_on").computed().build())
        .attribute(
            AttributeBuilder::number("total_instance_count")
                .computed()
                .build(),
        )
        .block(
            NestedBlockBuilder::list("target")
                .min_items(1)
                .max_items(1)
                .attribute(AttributeBuilder::string_set("account_groups").optional().build())
                .attribute(AttributeBuilder::string_set("accounts").optional().build())
                .attribute(AttributeBuilder::string_set("regions").optional().build())
                .attribute(
                    AttributeBuilder::string_set("compliance_standard_ids")
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::string_set("notify_to")
                        .description("Email addresses that receive the report")
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("schedule_enabled")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::string("schedule")
                        .description("iCal recurrence rule")
                        .optional()
                        .build(),
                )
                .attribute(AttributeBuilder::string("time_zone").optional().build())
                .attribute(
                    AttributeBuilder::bool("download_now")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .block(time_range_block(0))
                .build(),
        )
        .build()
}

pub fn parse_report(value: &DynamicValue) -> Report {
    let target = block_first(value, "target");

    Report {
        id: string_attr(value, "report_id"),
        name: string_attr(value, "name"),
        report_type: string_attr(value, "report_type"),
        cloud_type: string_attr(value, "cloud_type"),
        compliance_standard_id: string_attr(value, "compliance_standard_id"),
        locale: string_attr(value, "locale"),
        target: ReportTarget {
            account_groups: string_set_attr(&target, "account_groups"),
            accounts: string_set_attr(&target, "accounts"),
            regions: string_set_attr(&target, "regions"),
            compliance_standard_ids: string_set_attr(&target, "compliance_standard_ids"),
            time_range: parse_time_range(&target),
            notify_to: string_set_attr(&target, "notify_to"),
            schedule_enabled: bool_attr(&target, "schedule_enabled"),
            schedule: string_attr(&target, "schedule"),
            time_zone: string_attr(&target, "time_zone"),
            download_now: bool_attr(&target, "download_now"),
        },
        ..Default::default()
    }
}

fn target_value(target: &ReportTarget) -> Dynamic {
    let mut item = HashMap::new();
    item.insert("account_groups".to_string(), set_or_null(&target.account_groups));
    item.insert("accounts".to_string(), set_or_null(&target.accounts));
    item.insert("regions".to_string(), set_or_null(&target.regions));
    item.insert(
        "compliance_standard_ids".to_string(),
        set_or_null(&target.compliance_standard_ids),
    );
    item.insert(
        "time_range".to_string(),
        time_range_value(target.time_range.as_ref()),
    );
    item.insert("notify_to".to_string(), set_or_null(&target.notify_to));
    item.insert(
        "schedule_enabled".to_string(),
        Dynamic::from(target.schedule_enabled),
    );
    item.insert("schedule".to_string(), string_or_null(&target.schedule));
    item.insert("time_zone".to_string(), string_or_null(&target.time_zone));
    item.insert("download_now".to_string(), Dynamic::from(target.download_now));
    single_block(item)
}

pub fn save_report(state: &mut DynamicValue, report: &Report) {
    state.set_attribute("id", report.id.as_str());
    state.set_attribute("report_id", report.id.as_str());
    state.set_attribute("name", report.name.as_str());
    state.set_attribute("report_type", report.report_type.as_str());
    state.set_attribute("cloud_type", report.cloud_type.as_str());
    state.set_attribute(
        "compliance_standard_id",
        string_or_null(&report.compliance_standard_id),
    );
    state.set_attribute("locale", report.locale.as_str());
    state.set_attribute("target", target_value(&report.target));
    state.set_attribute("status", report.status.as_str());
    state.set_attribute("created_on", report.created_on);
    state.set_attribute("created_by", report.created_by.as_str());
    state.set_attribute("last_modified_on", report.last_modified_on);
    state.set_attribute("last_modified_by", report.last_modified_by.as_str());
    state.set_attribute("next_schedule", report.next_schedule);
    state.set_attribute("last_scheduled_on", report.last_scheduled_on);
    state.set_attribute("total_instance_count", report.total_instance_count);
}

impl ReportResource {
    async fn create_report(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let report = parse_report(state);
        let api = data.client.reports();

        api.create(&report).await?;
        let id = poll_until_success(ctx, &data.poll, || api.identify(&report.name)).await?;
        state.set_attribute("id", id.as_str());
        state.set_attribute("report_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_report(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for ReportResource {
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

        let result = self.create_report(&ctx, data, &mut state).await;
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
        let result = data.client.reports().get(&id).await;
        read_response(request.current_state, result, KIND, save_report)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut report = parse_report(&request.planned_state);
        report.id = string_attr(&request.prior_state, "id");
        let api = data.client.reports();

        let result = match api.update(&report).await {
            Ok(()) => api.get(&report.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_report,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.reports().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for ReportResource {
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

    fn configured_report() -> DynamicValue {
        let mut range = HashMap::new();
        range.insert("type".to_string(), Dynamic::from("relative"));
        range.insert("amount".to_string(), Dynamic::from(7i64));
        range.insert("unit".to_string(), Dynamic::from("day"));
        range.insert("start_time".to_string(), Dynamic::Null);
        range.insert("end_time".to_string(), Dynamic::Null);

        let mut target = HashMap::new();
        target.insert(
            "account_groups".to_string(),
            string_slice_to_set(&["ag-1".to_string()]),
        );
        target.insert("accounts".to_string(), Dynamic::Null);
        target.insert("regions".to_string(), Dynamic::Null);
        target.insert("compliance_standard_ids".to_string(), Dynamic::Null);
        target.insert("time_range".to_string(), single_block(range));
        target.insert(
            "notify_to".to_string(),
            string_slice_to_set(&["sec@example.com".to_string()]),
        );
        target.insert("schedule_enabled".to_string(), Dynamic::from(true));
        target.insert(
            "schedule".to_string(),
            Dynamic::from("FREQ=WEEKLY;BYDAY=MO"),
        );
        target.insert("time_zone".to_string(), Dynamic::from("UTC"));
        target.insert("download_now".to_string(), Dynamic::from(false));

        let mut value = DynamicValue::empty_object();
        value.set_attribute("name", "weekly risk");
        value.set_attribute("report_type", "RIS");
        value.set_attribute("cloud_type", "aws");
        value.set_attribute("locale", "en");
        value.set_attribute("target", single_block(target));
        value
    }

    #[test]
    fn parse_reads_time_range() {
        let report = parse_report(&configured_report());
        let range = report.target.time_range.unwrap();
        assert_eq!(range.range_type, "relative");
        assert_eq!(range.value.amount, Some(7));
        assert_eq!(range.value.unit.as_deref(), Some("day"));
        assert_eq!(range.value.start_time, None);
    }

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let config = configured_report();
        let mut echoed = parse_report(&config);
        echoed.id = "rep-1".to_string();

        let mut state = config.clone();
        save_report(&mut state, &echoed);

        for name in ["name", "report_type", "cloud_type", "locale", "target"] {
            assert_eq!(state.attribute(name), config.attribute(name), "{}", name);
        }
        assert_eq!(state.attribute("report_id").as_str(), Some("rep-1"));
    }
}
