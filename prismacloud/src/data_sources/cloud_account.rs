//! Cloud account data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::cloud_account::{AccountSummary, CloudAccount, CLOUD_TYPES};
use crate::resources::{cloud_account, ResourceError};
use crate::util::string_attr;
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "prismacloud_cloud_account";
pub const LIST_TYPE_NAME: &str = "prismacloud_cloud_accounts";

fn schema() -> Schema {
    let mut schema = computed_schema(
        cloud_account::schema(),
        "Looks up a cloud account by account ID or name",
        &[],
    );
    schema.block.attributes.extend([
        AttributeBuilder::string("cloud_type")
            .required()
            .validator(StringOneOfValidator::create(CLOUD_TYPES))
            .build(),
        AttributeBuilder::string("account_id").optional().computed().build(),
        AttributeBuilder::string("name").optional().computed().build(),
    ]);
    schema
}

fn save_account(state: &mut DynamicValue, account: &CloudAccount) {
    cloud_account::save_cloud_account(state, account);
    state.set_attribute("account_id", account.account_id());
    state.set_attribute("name", account.name());
}

#[derive(Default)]
pub struct CloudAccountDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl CloudAccountDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<CloudAccount, ResourceError> {
        let api = &data.client.cloud_accounts();
        let cloud = string_attr(config, "cloud_type");
        let cloud = cloud.as_str();
        resolve(
            lookup_key(config, "account_id", "name")?,
            move |id: String| async move { api.get(cloud, &id).await },
            move |name: String| async move { api.identify(cloud, &name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for CloudAccountDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: schema(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(request.config, result, "cloud account", save_account)
    }
}

#[async_trait]
impl DataSourceWithConfigure for CloudAccountDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct CloudAccountsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl CloudAccountsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(account: &AccountSummary) -> Dynamic {
    listing_item([
        ("account_id", Dynamic::from(account.account_id.as_str())),
        ("name", Dynamic::from(account.name.as_str())),
        ("cloud_type", Dynamic::from(account.cloud_type.as_str())),
        ("account_type", Dynamic::from(account.account_type.as_str())),
        ("enabled", Dynamic::from(account.enabled)),
        ("deployment_type", Dynamic::from(account.deployment_type.as_str())),
        ("protection_mode", Dynamic::from(account.protection_mode.as_str())),
        ("storage_scan_enabled", Dynamic::from(account.storage_scan_enabled)),
        ("ingestion_mode", Dynamic::from(account.ingestion_mode)),
        (
            "number_of_child_accounts",
            Dynamic::from(account.number_of_child_accounts),
        ),
        ("last_modified_by", Dynamic::from(account.last_modified_by.as_str())),
        ("last_modified_ts", Dynamic::from(account.last_modified_ts)),
    ])
}

#[async_trait]
impl DataSource for CloudAccountsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists the onboarded cloud accounts",
            &[
                ("account_id", AttributeType::String),
                ("name", AttributeType::String),
                ("cloud_type", AttributeType::String),
                ("account_type", AttributeType::String),
                ("enabled", AttributeType::Bool),
                ("deployment_type", AttributeType::String),
                ("protection_mode", AttributeType::String),
                ("storage_scan_enabled", AttributeType::Bool),
                ("ingestion_mode", AttributeType::Number),
                ("number_of_child_accounts", AttributeType::Number),
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

        let result = data.client.cloud_accounts().list().await;
        read_response(request.config, result, "cloud accounts", |state, accounts| {
            save_listing(state, accounts.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for CloudAccountsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_blocks_are_computed() {
        let schema = schema();
        for cloud in CLOUD_TYPES {
            let attr = schema.block.attribute(cloud).expect("cloud attribute");
            assert!(attr.computed && !attr.optional, "{}", cloud);
        }
        assert!(schema.block.attribute("cloud_type").is_some_and(|a| a.required));
    }
}
