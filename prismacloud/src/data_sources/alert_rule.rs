//! Alert rule data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::alert_rule::AlertRule;
use crate::resources::{alert_rule, ResourceError};
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

pub const TYPE_NAME: &str = "prismacloud_alert_rule";
pub const LIST_TYPE_NAME: &str = "prismacloud_alert_rules";

#[derive(Default)]
pub struct AlertRuleDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AlertRuleDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<AlertRule, ResourceError> {
        let api = &data.client.alert_rules();
        resolve(
            lookup_key(config, "policy_scan_config_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for AlertRuleDataSource {
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
                alert_rule::schema(),
                "Looks up an alert rule by ID or name",
                &["policy_scan_config_id", "name"],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(request.config, result, "alert rule", alert_rule::save_alert_rule)
    }
}

#[async_trait]
impl DataSourceWithConfigure for AlertRuleDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct AlertRulesDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl AlertRulesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(rule: &AlertRule) -> Dynamic {
    listing_item([
        (
            "policy_scan_config_id",
            Dynamic::from(rule.policy_scan_config_id.as_str()),
        ),
        ("name", Dynamic::from(rule.name.as_str())),
        ("description", Dynamic::from(rule.description.as_str())),
        ("enabled", Dynamic::from(rule.enabled)),
        ("scan_all", Dynamic::from(rule.scan_all)),
        ("owner", Dynamic::from(rule.owner.as_str())),
        ("open_alerts_count", Dynamic::from(rule.open_alerts_count)),
        ("read_only", Dynamic::from(rule.read_only)),
        ("last_modified_by", Dynamic::from(rule.last_modified_by.as_str())),
        ("last_modified_on", Dynamic::from(rule.last_modified_on)),
    ])
}

#[async_trait]
impl DataSource for AlertRulesDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists all alert rules",
            &[
                ("policy_scan_config_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("enabled", AttributeType::Bool),
                ("scan_all", AttributeType::Bool),
                ("owner", AttributeType::String),
                ("open_alerts_count", AttributeType::Number),
                ("read_only", AttributeType::Bool),
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

        let result = data.client.alert_rules().list().await;
        read_response(request.config, result, "alert rules", |state, rules| {
            save_listing(state, rules.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for AlertRulesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
