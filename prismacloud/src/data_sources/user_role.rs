//! User role data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::user_role::Role;
use crate::resources::{user_role, ResourceError};
use crate::util::string_slice_to_list;
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::AttributeType;
use tfplug::types::{Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_user_role";
pub const LIST_TYPE_NAME: &str = "prismacloud_user_roles";

#[derive(Default)]
pub struct UserRoleDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl UserRoleDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Role, ResourceError> {
        let api = &data.client.user_roles();
        resolve(
            lookup_key(config, "role_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for UserRoleDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: computed_schema(
                user_role::schema(),
                "Looks up a user role by ID or name",
                &["role_id", "name"],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(request.config, result, "user role", user_role::save_user_role)
    }
}

#[async_trait]
impl DataSourceWithConfigure for UserRoleDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct UserRolesDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl UserRolesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(role: &Role) -> Dynamic {
    listing_item([
        ("role_id", Dynamic::from(role.id.as_str())),
        ("name", Dynamic::from(role.name.as_str())),
        ("description", Dynamic::from(role.description.as_str())),
        ("role_type", Dynamic::from(role.role_type.as_str())),
        ("account_group_ids", string_slice_to_list(&role.account_group_ids)),
        ("associated_users", string_slice_to_list(&role.associated_users)),
        ("last_modified_by", Dynamic::from(role.last_modified_by.as_str())),
        ("last_modified_ts", Dynamic::from(role.last_modified_ts)),
    ])
}

#[async_trait]
impl DataSource for UserRolesDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists all user roles",
            &[
                ("role_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("role_type", AttributeType::String),
                (
                    "account_group_ids",
                    AttributeType::list(AttributeType::String),
                ),
                (
                    "associated_users",
                    AttributeType::list(AttributeType::String),
                ),
                ("last_modified_by", AttributeType::String),
                ("last_modified_ts", AttributeType::Number),
            ],
        )
        .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = data.client.user_roles().list().await;
        read_response(request.config, result, "user roles", |state, roles| {
            save_listing(state, roles.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for UserRolesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
