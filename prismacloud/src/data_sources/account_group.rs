//! Account group data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::account_group::AccountGroup;
use crate::resources::{account_group, ResourceError};
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

pub const TYPE_NAME: &str = "prismacloud_account_group";
pub const LIST_TYPE_NAME: &str = "prismacloud_account_groups";

#[derive(Default)]
pub struct AccountGroupDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AccountGroupDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<AccountGroup, ResourceError> {
        let api = &data.client.account_groups();
        resolve(
            lookup_key(config, "group_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for AccountGroupDataSource {
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
                account_group::schema(),
                "Looks up an account group by ID or name",
                &["group_id", "name"],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(
            request.config,
            result,
            "account group",
            account_group::save_account_group,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for AccountGroupDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct AccountGroupsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AccountGroupsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(group: &AccountGroup) -> Dynamic {
    listing_item([
        ("group_id", Dynamic::from(group.id.as_str())),
        ("name", Dynamic::from(group.name.as_str())),
        ("description", Dynamic::from(group.description.as_str())),
        ("account_ids", string_slice_to_list(&group.account_ids)),
        ("last_modified_by", Dynamic::from(group.last_modified_by.as_str())),
        ("last_modified_ts", Dynamic::from(group.last_modified_ts)),
    ])
}

#[async_trait]
impl DataSource for AccountGroupsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists all account groups",
            &[
                ("group_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("account_ids", AttributeType::list(AttributeType::String)),
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

        let result = data.client.account_groups().list().await;
        read_response(request.config, result, "account groups", |state, groups| {
            save_listing(state, groups.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for AccountGroupsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
