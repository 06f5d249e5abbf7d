//! Enterprise settings data source

use super::{computed_schema, configure_data_source, read_response, unconfigured};
use crate::resources::enterprise_settings;
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};

pub const TYPE_NAME: &str = "prismacloud_enterprise_settings";

#[derive(Default)]
pub struct EnterpriseSettingsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl EnterpriseSettingsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for EnterpriseSettingsDataSource {
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
                enterprise_settings::schema(),
                "Reads the tenant wide enterprise settings",
                &[],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = data.client.settings().get_enterprise().await;
        read_response(
            request.config,
            result,
            "enterprise settings",
            enterprise_settings::save_enterprise_settings,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for EnterpriseSettingsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
