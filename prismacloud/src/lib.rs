pub mod api;
pub mod config;
pub mod data_sources;
pub mod poll;
pub mod provider_data;
pub mod resources;
pub mod util;

pub use provider_data::PrismaCloudProviderData;

use async_trait::async_trait;
use config::ProviderConfig;
use poll::PollConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, Schema, SchemaBuilder};
use tfplug::types::Diagnostic;
use tfplug::validator::StringOneOfValidator;
use tracing::info;

pub const PROVIDER_NAME: &str = "prismacloud";

#[derive(Default)]
pub struct PrismaCloudProvider {
    provider_data: Option<PrismaCloudProviderData>,
}

impl PrismaCloudProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_data(&self) -> Option<&PrismaCloudProviderData> {
        self.provider_data.as_ref()
    }
}

pub fn provider_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Prisma Cloud provider")
        .attribute(
            AttributeBuilder::string("url")
                .description("API host, e.g. api.prismacloud.io (PRISMACLOUD_URL)")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("username")
                .description("Access key ID or username (PRISMACLOUD_USERNAME)")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("password")
                .description("Secret key or password (PRISMACLOUD_PASSWORD)")
                .optional()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("customer_name")
                .description("Customer name, for users with more than one tenant")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("protocol")
                .description("http or https, defaults to https")
                .optional()
                .validator(StringOneOfValidator::create(&["http", "https"]))
                .build(),
        )
        .attribute(AttributeBuilder::number("port").optional().build())
        .attribute(
            AttributeBuilder::number("timeout")
                .description("Request timeout in seconds, defaults to 90")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("skip_ssl_cert_verification")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("max_retries")
                .description("Retries of failed API calls, defaults to 3")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("retry_max_delay")
                .description("Upper bound of the retry backoff in milliseconds")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("poll_timeout")
                .description("Seconds to wait for new objects to become readable, defaults to 300")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("json_config_file")
                .description("JSON file holding any of the settings above")
                .optional()
                .build(),
        )
        .build()
}

#[async_trait]
impl Provider for PrismaCloudProvider {
    fn type_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: provider_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = match ProviderConfig::resolve(&request.config) {
            Ok(config) => config,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Invalid provider configuration",
                        e.to_string(),
                    )],
                    provider_data: None,
                }
            }
        };

        let client = match api::Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    )],
                    provider_data: None,
                }
            }
        };

        info!(url = %config.url, "Configured Prisma Cloud provider");
        let poll = PollConfig::default().with_timeout(config.poll_timeout());
        let data = PrismaCloudProviderData::new(client, poll);
        self.provider_data = Some(data.clone());

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(data)),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        fn factory<R: ResourceWithConfigure + 'static>(new: fn() -> R) -> ResourceFactory {
            Box::new(move || Box::new(new()) as Box<dyn ResourceWithConfigure>)
        }

        use resources::*;
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            account_group::TYPE_NAME.to_string(),
            factory(AccountGroupResource::new),
        );
        resources.insert(
            alert_rule::TYPE_NAME.to_string(),
            factory(AlertRuleResource::new),
        );
        resources.insert(
            cloud_account::TYPE_NAME.to_string(),
            factory(CloudAccountResource::new),
        );
        resources.insert(
            compliance_standard::TYPE_NAME.to_string(),
            factory(ComplianceStandardResource::new),
        );
        resources.insert(
            compliance_standard_requirement::TYPE_NAME.to_string(),
            factory(ComplianceStandardRequirementResource::new),
        );
        resources.insert(
            compliance_standard_requirement_section::TYPE_NAME.to_string(),
            factory(ComplianceStandardRequirementSectionResource::new),
        );
        resources.insert(
            enterprise_settings::TYPE_NAME.to_string(),
            factory(EnterpriseSettingsResource::new),
        );
        resources.insert(
            integration::TYPE_NAME.to_string(),
            factory(IntegrationResource::new),
        );
        resources.insert(policy::TYPE_NAME.to_string(), factory(PolicyResource::new));
        resources.insert(report::TYPE_NAME.to_string(), factory(ReportResource::new));
        resources.insert(
            saved_search::TYPE_NAME.to_string(),
            factory(SavedSearchResource::new),
        );
        resources.insert(
            user_role::TYPE_NAME.to_string(),
            factory(UserRoleResource::new),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        fn factory<D: DataSourceWithConfigure + 'static>(new: fn() -> D) -> DataSourceFactory {
            Box::new(move || Box::new(new()) as Box<dyn DataSourceWithConfigure>)
        }

        use data_sources::*;
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        let mut add = |name: &str, f: DataSourceFactory| {
            data_sources.insert(name.to_string(), f);
        };

        add(account_group::TYPE_NAME, factory(AccountGroupDataSource::new));
        add(account_group::LIST_TYPE_NAME, factory(AccountGroupsDataSource::new));
        add(alert_rule::TYPE_NAME, factory(AlertRuleDataSource::new));
        add(alert_rule::LIST_TYPE_NAME, factory(AlertRulesDataSource::new));
        add(cloud_account::TYPE_NAME, factory(CloudAccountDataSource::new));
        add(cloud_account::LIST_TYPE_NAME, factory(CloudAccountsDataSource::new));
        add(
            compliance_standard::TYPE_NAME,
            factory(ComplianceStandardDataSource::new),
        );
        add(
            compliance_standard::LIST_TYPE_NAME,
            factory(ComplianceStandardsDataSource::new),
        );
        add(
            compliance_standard_requirement::TYPE_NAME,
            factory(ComplianceStandardRequirementDataSource::new),
        );
        add(
            compliance_standard_requirement::LIST_TYPE_NAME,
            factory(ComplianceStandardRequirementsDataSource::new),
        );
        add(
            compliance_standard_requirement_section::TYPE_NAME,
            factory(ComplianceStandardRequirementSectionDataSource::new),
        );
        add(
            compliance_standard_requirement_section::LIST_TYPE_NAME,
            factory(ComplianceStandardRequirementSectionsDataSource::new),
        );
        add(
            enterprise_settings::TYPE_NAME,
            factory(EnterpriseSettingsDataSource::new),
        );
        add(integration::TYPE_NAME, factory(IntegrationDataSource::new));
        add(integration::LIST_TYPE_NAME, factory(IntegrationsDataSource::new));
        add(policy::TYPE_NAME, factory(PolicyDataSource::new));
        add(policy::LIST_TYPE_NAME, factory(PoliciesDataSource::new));
        add(report::TYPE_NAME, factory(ReportDataSource::new));
        add(report::LIST_TYPE_NAME, factory(ReportsDataSource::new));
        add(rql::SEARCH_TYPE_NAME, factory(RqlSearchDataSource::new));
        add(rql::HISTORIC_TYPE_NAME, factory(RqlHistoricSearchDataSource::new));
        add(
            rql::HISTORIC_LIST_TYPE_NAME,
            factory(RqlHistoricSearchesDataSource::new),
        );
        add(user_role::TYPE_NAME, factory(UserRoleDataSource::new));
        add(user_role::LIST_TYPE_NAME, factory(UserRolesDataSource::new));
        data_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::data_source::DataSource;
    use tfplug::resource::Resource;
    use tfplug::types::{ClientCapabilities, DynamicValue};

    fn configure_request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn clear_env() {
        for key in [
            "PRISMACLOUD_URL",
            "PRISMACLOUD_USERNAME",
            "PRISMACLOUD_PASSWORD",
            "PRISMACLOUD_JSON_CONFIG_FILE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_from_block() {
        clear_env();
        let mut config = DynamicValue::empty_object();
        config.set_attribute("url", "api.prismacloud.io");
        config.set_attribute("username", "key-id");
        config.set_attribute("password", "secret");
        config.set_attribute("poll_timeout", 30i64);

        let mut provider = PrismaCloudProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(config))
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.provider_data.is_some());
        let data = provider.provider_data().expect("provider data");
        assert_eq!(data.poll.timeout, std::time::Duration::from_secs(30));
        assert_eq!(data.client.base_url(), "https://api.prismacloud.io");
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_credentials() {
        clear_env();
        let mut config = DynamicValue::empty_object();
        config.set_attribute("url", "api.prismacloud.io");

        let mut provider = PrismaCloudProvider::new();
        let response = provider
            .configure(Context::new(), configure_request(config))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("username is required"));
        assert!(response.provider_data.is_none());
    }

    #[test]
    fn registration_tables_match_type_names() {
        let provider = PrismaCloudProvider::new();

        let resources = provider.resources();
        assert_eq!(resources.len(), 12);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name);
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 24);
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name);
        }
        assert!(data_sources.contains_key("prismacloud_rql_search"));
        assert!(data_sources.contains_key("prismacloud_policies"));
    }

    #[test]
    fn password_is_sensitive() {
        let provider = PrismaCloudProvider::new();
        let response = tokio_test::block_on(
            provider.schema(Context::new(), ProviderSchemaRequest),
        );
        let schema = response.schema;
        assert!(schema.block.attribute("password").is_some_and(|a| a.sensitive));
        assert!(schema.block.attributes.iter().all(|a| !a.required));
    }
}
