//! User role resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::user_role::{AdditionalAttributes, Role, ROLE_TYPES};
use crate::poll::poll_until_success;
use crate::util::{
    block_first, bool_attr, set_or_null, single_block, string_attr, string_or_null,
    string_set_attr, string_slice_to_list,
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "prismacloud_user_role";

const KIND: &str = "user role";

const ADDITIONAL_ATTRIBUTES: &[&str] = &[
    "only_allow_ci_access",
    "only_allow_compute_access",
    "only_allow_read_access",
    "has_defender_permissions",
];

#[derive(Default)]
pub struct UserRoleResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl UserRoleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    let mut additional = NestedBlockBuilder::list("additional_attributes").max_items(1);
    for name in ADDITIONAL_ATTRIBUTES {
        additional =
            additional.attribute(AttributeBuilder::bool(name).default(StaticDefault::bool(false)).build());
    }

    SchemaBuilder::new()
        .version(0)
        .description("Manages a user role and the account groups it grants access to")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("role_id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::string("role_type")
                .required()
                .validator(StringOneOfValidator::create(ROLE_TYPES))
                .build(),
        )
        .attribute(AttributeBuilder::string_set("account_group_ids").optional().build())
        .attribute(AttributeBuilder::string_set("resource_list_ids").optional().build())
        .attribute(
            AttributeBuilder::string_set("code_repository_ids")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("restrict_dismissal_access")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "associated_users",
                AttributeType::list(AttributeType::String),
            )
            .computed()
            .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "account_groups",
                AttributeType::list(AttributeType::Object(HashMap::from([
                    ("id".to_string(), AttributeType::String),
                    ("name".to_string(), AttributeType::String),
                ]))),
            )
            .computed()
            .build(),
        )
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_ts").computed().build())
        .block(additional.build())
        .build()
}

pub fn parse_user_role(value: &DynamicValue) -> Role {
    let additional = block_first(value, "additional_attributes");

    Role {
        id: string_attr(value, "role_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        role_type: string_attr(value, "role_type"),
        account_group_ids: string_set_attr(value, "account_group_ids"),
        resource_list_ids: string_set_attr(value, "resource_list_ids"),
        code_repository_ids: string_set_attr(value, "code_repository_ids"),
        restrict_dismissal_access: bool_attr(value, "restrict_dismissal_access"),
        additional_attributes: (!additional.is_empty()).then(|| AdditionalAttributes {
            only_allow_ci_access: bool_attr(&additional, "only_allow_ci_access"),
            only_allow_compute_access: bool_attr(&additional, "only_allow_compute_access"),
            only_allow_read_access: bool_attr(&additional, "only_allow_read_access"),
            has_defender_permissions: bool_attr(&additional, "has_defender_permissions"),
        }),
        ..Default::default()
    }
}

pub fn save_user_role(state: &mut DynamicValue, role: &Role) {
    state.set_attribute("id", role.id.as_str());
    state.set_attribute("role_id", role.id.as_str());
    state.set_attribute("name", role.name.as_str());
    state.set_attribute("description", string_or_null(&role.description));
    state.set_attribute("role_type", role.role_type.as_str());
    state.set_attribute("account_group_ids", set_or_null(&role.account_group_ids));
    state.set_attribute("resource_list_ids", set_or_null(&role.resource_list_ids));
    state.set_attribute(
        "code_repository_ids",
        set_or_null(&role.code_repository_ids),
    );
    state.set_attribute("restrict_dismissal_access", role.restrict_dismissal_access);
    state.set_attribute(
        "associated_users",
        string_slice_to_list(&role.associated_users),
    );
    state.set_attribute(
        "account_groups",
        Dynamic::List(
            role.account_groups
                .iter()
                .map(|group| {
                    let mut item = HashMap::new();
                    item.insert("id".to_string(), Dynamic::from(group.id.as_str()));
                    item.insert("name".to_string(), Dynamic::from(group.name.as_str()));
                    Dynamic::Map(item)
                })
                .collect(),
        ),
    );
    state.set_attribute("last_modified_by", role.last_modified_by.as_str());
    state.set_attribute("last_modified_ts", role.last_modified_ts);

    let additional = match &role.additional_attributes {
        Some(attrs) => {
            let mut item = HashMap::new();
            item.insert(
                "only_allow_ci_access".to_string(),
                Dynamic::from(attrs.only_allow_ci_access),
            );
            item.insert(
                "only_allow_compute_access".to_string(),
                Dynamic::from(attrs.only_allow_compute_access),
            );
            item.insert(
                "only_allow_read_access".to_string(),
                Dynamic::from(attrs.only_allow_read_access),
            );
            item.insert(
                "has_defender_permissions".to_string(),
                Dynamic::from(attrs.has_defender_permissions),
            );
            single_block(item)
        }
        None => Dynamic::List(vec![]),
    };
    // The API reports an all-false block even when none was configured
    let configured = state
        .attribute("additional_attributes")
        .as_list()
        .is_some_and(|items| !items.is_empty());
    let all_false = role
        .additional_attributes
        .as_ref()
        .is_none_or(|attrs| *attrs == AdditionalAttributes::default());
    if configured || !all_false {
        state.set_attribute("additional_attributes", additional);
    } else {
        state.set_attribute("additional_attributes", Dynamic::List(vec![]));
    }
}

impl UserRoleResource {
    async fn create_user_role(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let role = parse_user_role(state);
        let api = data.client.user_roles();

        api.create(&role).await?;
        let id = poll_until_success(ctx, &data.poll, || api.identify(&role.name)).await?;
        state.set_attribute("id", id.as_str());
        state.set_attribute("role_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_user_role(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for UserRoleResource {
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

        let result = self.create_user_role(&ctx, data, &mut state).await;
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
        let result = data.client.user_roles().get(&id).await;
        read_response(request.current_state, result, KIND, save_user_role)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut role = parse_user_role(&request.planned_state);
        role.id = string_attr(&request.prior_state, "id");
        let api = data.client.user_roles();

        let result = match api.update(&role).await {
            Ok(()) => api.get(&role.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_user_role,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.user_roles().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for UserRoleResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
