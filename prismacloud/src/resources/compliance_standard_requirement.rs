//! Compliance standard requirement resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::compliance::Requirement;
use crate::poll::poll_until_success;
use crate::util::{id_to_two_strings, int_attr, string_attr, string_or_null, two_strings_to_id};
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
use tfplug::schema::{AttributeBuilder, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;

pub const TYPE_NAME: &str = "prismacloud_compliance_standard_requirement";

const KIND: &str = "compliance requirement";

#[derive(Default)]
pub struct ComplianceStandardRequirementResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a requirement of a custom compliance standard")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("cs_id")
                .description("Compliance standard ID")
                .required()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("csr_id")
                .description("Compliance requirement ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::string("requirement_id")
                .description("Requirement number, e.g. 1.2")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("view_order")
                .optional()
                .computed()
                .build(),
        )
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
        .attribute(AttributeBuilder::string("standard_name").computed().build())
        .build()
}

pub fn parse_requirement(value: &DynamicValue) -> Requirement {
    Requirement {
        id: string_attr(value, "csr_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        requirement_id: string_attr(value, "requirement_id"),
        view_order: int_attr(value, "view_order"),
        ..Default::default()
    }
}

pub fn save_requirement(state: &mut DynamicValue, requirement: &Requirement) {
    let cs_id = if requirement.compliance_id.is_empty() {
        string_attr(state, "cs_id")
    } else {
        requirement.compliance_id.clone()
    };

    state.set_attribute("id", two_strings_to_id(&cs_id, &requirement.id));
    state.set_attribute("cs_id", cs_id);
    state.set_attribute("csr_id", requirement.id.as_str());
    state.set_attribute("name", requirement.name.as_str());
    state.set_attribute("description", string_or_null(&requirement.description));
    state.set_attribute("requirement_id", requirement.requirement_id.as_str());
    state.set_attribute("view_order", requirement.view_order);
    state.set_attribute("created_by", requirement.created_by.as_str());
    state.set_attribute("created_on", requirement.created_on);
    state.set_attribute("last_modified_by", requirement.last_modified_by.as_str());
    state.set_attribute("last_modified_on", requirement.last_modified_on);
    state.set_attribute("system_default", requirement.system_default);
    state.set_attribute(
        "policies_assigned_count",
        requirement.policies_assigned_count,
    );
    state.set_attribute("standard_name", requirement.standard_name.as_str());
}

impl ComplianceStandardRequirementResource {
    async fn create_requirement(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let requirement = parse_requirement(state);
        let cs_id = string_attr(state, "cs_id");
        let api = data.client.compliance().requirements();

        api.create(&cs_id, &requirement).await?;
        let csr_id =
            poll_until_success(ctx, &data.poll, || api.identify(&cs_id, &requirement.name))
                .await?;
        state.set_attribute("id", two_strings_to_id(&cs_id, &csr_id));
        state.set_attribute("csr_id", csr_id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&csr_id)).await?;
        save_requirement(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for ComplianceStandardRequirementResource {
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

        let result = self.create_requirement(&ctx, data, &mut state).await;
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
        let (cs_id, csr_id) = id_to_two_strings(&string_attr(&state, "id"));
        // After an import only the id is known
        state.set_attribute("cs_id", cs_id);

        let result = data.client.compliance().requirements().get(&csr_id).await;
        read_response(state, result, KIND, save_requirement)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut requirement = parse_requirement(&request.planned_state);
        requirement.id = string_attr(&request.prior_state, "csr_id");
        let api = data.client.compliance().requirements();

        let result = match api.update(&requirement).await {
            Ok(()) => api.get(&requirement.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_requirement,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let (_, csr_id) = id_to_two_strings(&string_attr(&request.prior_state, "id"));
        delete_response(
            data.client.compliance().requirements().delete(&csr_id).await,
            KIND,
        )
    }
}

#[async_trait]
impl ResourceWithConfigure for ComplianceStandardRequirementResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
