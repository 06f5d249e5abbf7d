//! Compliance standard resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::compliance::Standard;
use crate::poll::poll_until_success;
use crate::util::{string_attr, string_or_null, string_slice_to_list};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;

pub const TYPE_NAME: &str = "prismacloud_compliance_standard";

const KIND: &str = "compliance standard";

#[derive(Default)]
pub struct ComplianceStandardResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a custom compliance standard")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("cs_id")
                .description("Compliance standard ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(AttributeBuilder::string("description").optional().build())
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
            AttributeBuilder::new("cloud_types", AttributeType::list(AttributeType::String))
                .description("Cloud types covered by the standard")
                .computed()
                .build(),
        )
        .build()
}

pub fn parse_compliance_standard(value: &DynamicValue) -> Standard {
    Standard {
        id: string_attr(value, "cs_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        ..Default::default()
    }
}

pub fn save_compliance_standard(state: &mut DynamicValue, standard: &Standard) {
    state.set_attribute("id", standard.id.as_str());
    state.set_attribute("cs_id", standard.id.as_str());
    state.set_attribute("name", standard.name.as_str());
    state.set_attribute("description", string_or_null(&standard.description));
    state.set_attribute("created_by", standard.created_by.as_str());
    state.set_attribute("created_on", standard.created_on);
    state.set_attribute("last_modified_by", standard.last_modified_by.as_str());
    state.set_attribute("last_modified_on", standard.last_modified_on);
    state.set_attribute("system_default", standard.system_default);
    state.set_attribute("policies_assigned_count", standard.policies_assigned_count);
    state.set_attribute("cloud_types", string_slice_to_list(&standard.cloud_type));
}

impl ComplianceStandardResource {
    async fn create_standard(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let standard = parse_compliance_standard(state);
        let api = data.client.compliance().standards();

        api.create(&standard).await?;
        let id = poll_until_success(ctx, &data.poll, || api.identify(&standard.name)).await?;
        state.set_attribute("id", id.as_str());
        state.set_attribute("cs_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_compliance_standard(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for ComplianceStandardResource {
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

        let result = self.create_standard(&ctx, data, &mut state).await;
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
        let result = data.client.compliance().standards().get(&id).await;
        read_response(request.current_state, result, KIND, save_compliance_standard)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut standard = parse_compliance_standard(&request.planned_state);
        standard.id = string_attr(&request.prior_state, "id");
        let api = data.client.compliance().standards();

        let result = match api.update(&standard).await {
            Ok(()) => api.get(&standard.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_compliance_standard,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.compliance().standards().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for ComplianceStandardResource {
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
    use tfplug::types::Dynamic;

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let mut config = DynamicValue::empty_object();
        config.set_attribute("name", "internal baseline");
        config.set_attribute("description", "controls we audit every quarter");

        let mut echoed = parse_compliance_standard(&config);
        echoed.id = "cs-1".to_string();
        echoed.cloud_type = vec!["aws".to_string(), "gcp".to_string()];

        let mut state = config.clone();
        save_compliance_standard(&mut state, &echoed);

        assert_eq!(state.attribute("name"), config.attribute("name"));
        assert_eq!(state.attribute("description"), config.attribute("description"));
        assert_eq!(state.attribute("cs_id").as_str(), Some("cs-1"));
        assert_eq!(
            state.attribute("cloud_types"),
            &Dynamic::List(vec![Dynamic::from("aws"), Dynamic::from("gcp")])
        );
    }
}
