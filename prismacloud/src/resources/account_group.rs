//! Account group resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::account_group::AccountGroup;
use crate::poll::poll_until_success;
use crate::util::{int_attr, set_or_null, string_attr, string_or_null, string_set_attr};
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
use tfplug::schema::{AttributeBuilder, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_account_group";

const KIND: &str = "account group";

#[derive(Default)]
pub struct AccountGroupResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AccountGroupResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages an account group, a named collection of cloud accounts")
        .attribute(
            AttributeBuilder::string("id")
                .description("Account group ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("group_id")
                .description("Account group ID")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("name")
                .description("Name of the account group")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("description")
                .description("Description")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string_set("account_ids")
                .description("Cloud account IDs in this group")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string_set("child_group_ids")
                .description("Nested account group IDs")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("last_modified_by")
                .description("Last modified by")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("last_modified_ts")
                .description("Last modified timestamp")
                .computed()
                .build(),
        )
        .build()
}

pub fn parse_account_group(value: &DynamicValue) -> AccountGroup {
    AccountGroup {
        id: string_attr(value, "group_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        account_ids: string_set_attr(value, "account_ids"),
        child_group_ids: string_set_attr(value, "child_group_ids"),
        last_modified_by: string_attr(value, "last_modified_by"),
        last_modified_ts: int_attr(value, "last_modified_ts"),
        ..Default::default()
    }
}

pub fn save_account_group(state: &mut DynamicValue, group: &AccountGroup) {
    state.set_attribute("id", group.id.as_str());
    state.set_attribute("group_id", group.id.as_str());
    state.set_attribute("name", group.name.as_str());
    state.set_attribute("description", string_or_null(&group.description));
    state.set_attribute("account_ids", set_or_null(&group.account_ids));
    state.set_attribute("child_group_ids", set_or_null(&group.child_group_ids));
    state.set_attribute("last_modified_by", group.last_modified_by.as_str());
    state.set_attribute("last_modified_ts", Dynamic::from(group.last_modified_ts));
}

impl AccountGroupResource {
    async fn create_account_group(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let group = parse_account_group(state);
        let api = data.client.account_groups();

        let created = api.create(&group).await?;
        let id = match created.filter(|g| !g.id.is_empty()) {
            Some(g) => g.id,
            None => poll_until_success(ctx, &data.poll, || api.identify(&group.name)).await?,
        };
        state.set_attribute("id", id.as_str());
        state.set_attribute("group_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_account_group(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for AccountGroupResource {
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

        let result = self.create_account_group(&ctx, data, &mut state).await;
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
        let result = data.client.account_groups().get(&id).await;
        read_response(request.current_state, result, KIND, save_account_group)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut group = parse_account_group(&request.planned_state);
        group.id = string_attr(&request.prior_state, "id");
        let api = data.client.account_groups();

        let result = match api.update(&group).await {
            Ok(()) => api.get(&group.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_account_group,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.account_groups().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for AccountGroupResource {
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

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let mut config = DynamicValue::empty_object();
        config.set_attribute("name", "prod accounts");
        config.set_attribute("description", "all production");
        config.set_attribute(
            "account_ids",
            string_slice_to_set(&["222".to_string(), "111".to_string()]),
        );

        let mut echoed = parse_account_group(&config);
        echoed.id = "ag-1".to_string();

        let mut state = config.clone();
        save_account_group(&mut state, &echoed);

        assert_eq!(state.attribute("name"), config.attribute("name"));
        assert_eq!(state.attribute("description"), config.attribute("description"));
        assert_eq!(state.attribute("account_ids"), config.attribute("account_ids"));
        assert_eq!(state.attribute("id").as_str(), Some("ag-1"));
        assert!(state.attribute("child_group_ids").is_null());
    }

    #[test]
    fn schema_requires_name() {
        let schema = schema();
        let name = schema.block.attribute("name").unwrap();
        assert!(name.required);
        assert!(schema.block.attribute("id").unwrap().computed);
    }
}
