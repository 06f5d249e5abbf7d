//! Compliance standard requirement section resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::compliance::Section;
use crate::poll::poll_until_success;
use crate::util::{
    id_to_two_strings, int_attr, string_attr, string_or_null, string_slice_to_list,
    two_strings_to_id,
};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;

pub const TYPE_NAME: &str = "prismacloud_compliance_standard_requirement_section";

const KIND: &str = "compliance section";

#[derive(Default)]
pub struct ComplianceStandardRequirementSectionResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementSectionResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a section of a compliance standard requirement")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("csr_id")
                .description("Compliance requirement ID")
                .required()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("csrs_id")
                .description("Compliance section ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("section_id")
                .description("Section number, e.g. 1.2.3")
                .required()
                .build(),
        )
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::number("view_order")
                .optional()
                .computed()
                .build(),
        )
        .attribute(AttributeBuilder::string("requirement_name").computed().build())
        .attribute(AttributeBuilder::string("standard_name").computed().build())
        .attribute(AttributeBuilder::string("created_by").computed().build())
        .attribute(AttributeBuilder::number("created_on").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_on").computed().build())
        .attribute(AttributeBuilder::bool("system_default").computed().build())
        .attribute(
            AttributeBuilder::number("policies_assigned_count")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "associated_policy_ids",
                AttributeType::list(AttributeType::String),
            )
            .computed()
            .build(),
        )
        .attribute(AttributeBuilder::string("label").computed().build())
        .build()
}

pub fn parse_section(value: &DynamicValue) -> Section {
    Section {
        id: string_attr(value, "csrs_id"),
        section_id: string_attr(value, "section_id"),
        description: string_attr(value, "description"),
        view_order: int_attr(value, "view_order"),
        ..Default::default()
    }
}

pub fn save_section(state: &mut DynamicValue, section: &Section) {
    let csr_id = string_attr(state, "csr_id");

    state.set_attribute("id", two_strings_to_id(&csr_id, &section.id));
    state.set_attribute("csrs_id", section.id.as_str());
    state.set_attribute("section_id", section.section_id.as_str());
    state.set_attribute("description", string_or_null(&section.description));
    state.set_attribute("view_order", section.view_order);
    state.set_attribute("requirement_name", section.requirement_name.as_str());
    state.set_attribute("standard_name", section.standard_name.as_str());
    state.set_attribute("created_by", section.created_by.as_str());
    state.set_attribute("created_on", section.created_on);
    state.set_attribute("last_modified_by", section.last_modified_by.as_str());
    state.set_attribute("last_modified_on", section.last_modified_on);
    state.set_attribute("system_default", section.system_default);
    state.set_attribute("policies_assigned_count", section.policies_assigned_count);
    state.set_attribute(
        "associated_policy_ids",
        string_slice_to_list(&section.associated_policy_ids),
    );
    state.set_attribute("label", section.label.as_str());
}

impl ComplianceStandardRequirementSectionResource {
    async fn create_section(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let section = parse_section(state);
        let csr_id = string_attr(state, "csr_id");
        let api = data.client.compliance().sections();

        api.create(&csr_id, &section).await?;
        let csrs_id =
            poll_until_success(ctx, &data.poll, || api.identify(&csr_id, &section.section_id))
                .await?;
        state.set_attribute("id", two_strings_to_id(&csr_id, &csrs_id));
        state.set_attribute("csrs_id", csrs_id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&csr_id, &csrs_id)).await?;
        save_section(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for ComplianceStandardRequirementSectionResource {
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

        let result = self.create_section(&ctx, data, &mut state).await;
        create_response(state, result, KIND)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let mut state = request.current_state;
        let (csr_id, csrs_id) = id_to_two_strings(&string_attr(&state, "id"));
        state.set_attribute("csr_id", csr_id.as_str());

        let result = data
            .client
            .compliance()
            .sections()
            .get(&csr_id, &csrs_id)
            .await;
        read_response(state, result, KIND, save_section)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut section = parse_section(&request.planned_state);
        section.id = string_attr(&request.prior_state, "csrs_id");
        let csr_id = string_attr(&request.prior_state, "csr_id");
        let api = data.client.compliance().sections();

        let result = match api.update(&csr_id, &section).await {
            Ok(()) => api.get(&csr_id, &section.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_section,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let (csr_id, csrs_id) = id_to_two_strings(&string_attr(&request.prior_state, "id"));
        delete_response(
            data.client
                .compliance()
                .sections()
                .delete(&csr_id, &csrs_id)
                .await,
            KIND,
        )
    }
}

#[async_trait]
impl ResourceWithConfigure for ComplianceStandardRequirementSectionResource {
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

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let mut config = DynamicValue::empty_object();
        config.set_attribute("csr_id", "csr-1");
        config.set_attribute("section_id", "1.2.3");
        config.set_attribute("description", "rotate keys");
        config.set_attribute("view_order", 1i64);

        let mut echoed = parse_section(&config);
        echoed.id = "sec-7".to_string();
        echoed.associated_policy_ids = vec!["pol-1".to_string()];

        let mut state = config.clone();
        save_section(&mut state, &echoed);

        for name in ["csr_id", "section_id", "description", "view_order"] {
            assert_eq!(state.attribute(name), config.attribute(name), "{}", name);
        }
        assert_eq!(state.attribute("id").as_str(), Some("csr-1.sec-7"));
        assert_eq!(state.attribute("csrs_id").as_str(), Some("sec-7"));
    }
}
