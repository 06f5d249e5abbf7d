//! Report data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::report::Report;
use crate::resources::{report, ResourceError};
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

pub const TYPE_NAME: &str = "prismacloud_report";
pub const LIST_TYPE_NAME: &str = "prismacloud_reports";

#[derive(Default)]
pub struct ReportDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ReportDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Report, ResourceError> {
        let api = &data.client.reports();
        resolve(
            lookup_key(config, "report_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for ReportDataSource {
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
                report::schema(),
                "Looks up a report by ID or name",
                &["report_id", "name"],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(request.config, result, "report", report::save_report)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ReportDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ReportsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ReportsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(report: &Report) -> Dynamic {
    listing_item([
        ("report_id", Dynamic::from(report.id.as_str())),
        ("name", Dynamic::from(report.name.as_str())),
        ("report_type", Dynamic::from(report.report_type.as_str())),
        ("cloud_type", Dynamic::from(report.cloud_type.as_str())),
        ("status", Dynamic::from(report.status.as_str())),
        ("next_schedule", Dynamic::from(report.next_schedule)),
        ("last_scheduled_on", Dynamic::from(report.last_scheduled_on)),
        ("total_instance_count", Dynamic::from(report.total_instance_count)),
        ("last_modified_by", Dynamic::from(report.last_modified_by.as_str())),
        ("last_modified_on", Dynamic::from(report.last_modified_on)),
    ])
}

#[async_trait]
impl DataSource for ReportsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists all reports",
            &[
                ("report_id", AttributeType::String),
                ("name", AttributeType::String),
                ("report_type", AttributeType::String),
                ("cloud_type", AttributeType::String),
                ("status", AttributeType::String),
                ("next_schedule", AttributeType::Number),
                ("last_scheduled_on", AttributeType::Number),
                ("total_instance_count", AttributeType::Number),
                ("last_modified_by", AttributeType::String),
                ("last_modified_on", AttributeType::Number),
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

        let result = data.client.reports().list().await;
        read_response(request.config, result, "reports", |state, reports| {
            save_listing(state, reports.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for ReportsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
