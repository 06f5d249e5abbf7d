use prismacloud::PrismaCloudProvider;
use serial_test::serial;
use tfplug::grpc::GrpcProviderServer;
use tfplug::proto::{self, ProviderService};
use tfplug::types::{Dynamic, DynamicValue};
use tonic::Request;

fn dv(pairs: &[(&str, Dynamic)]) -> Option<proto::DynamicValue> {
    let mut value = DynamicValue::empty_object();
    for (k, v) in pairs {
        value.set_attribute(k, v.clone());
    }
    Some(proto::DynamicValue {
        msgpack: value.encode_msgpack().unwrap(),
        json: Vec::new(),
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_covers_every_type() {
    let server = GrpcProviderServer::new(PrismaCloudProvider::new());
    let schema = server
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert!(schema.diagnostics.is_empty());
    for name in [
        "prismacloud_account_group",
        "prismacloud_alert_rule",
        "prismacloud_cloud_account",
        "prismacloud_compliance_standard",
        "prismacloud_compliance_standard_requirement",
        "prismacloud_compliance_standard_requirement_section",
        "prismacloud_enterprise_settings",
        "prismacloud_integration",
        "prismacloud_policy",
        "prismacloud_report",
        "prismacloud_saved_search",
        "prismacloud_user_role",
    ] {
        assert!(schema.resource_schemas.contains_key(name), "missing {name}");
    }
    for name in [
        "prismacloud_account_groups",
        "prismacloud_cloud_accounts",
        "prismacloud_policies",
        "prismacloud_rql_search",
        "prismacloud_rql_historic_searches",
    ] {
        assert!(schema.data_source_schemas.contains_key(name), "missing {name}");
    }
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn configure_without_credentials_fails() {
    for key in [
        "PRISMACLOUD_URL",
        "PRISMACLOUD_USERNAME",
        "PRISMACLOUD_PASSWORD",
        "PRISMACLOUD_JSON_CONFIG_FILE",
    ] {
        std::env::remove_var(key);
    }

    let server = GrpcProviderServer::new(PrismaCloudProvider::new());
    let response = server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: dv(&[]),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(
        response.diagnostics[0].summary,
        "Invalid provider configuration"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn validation_rejects_unknown_search_type() {
    let server = GrpcProviderServer::new(PrismaCloudProvider::new());
    let response = server
        .validate_data_resource_config(Request::new(proto::validate_data_resource_config::Request {
            type_name: "prismacloud_rql_search".to_string(),
            config: dv(&[
                ("search_type", Dynamic::from("bogus")),
                ("query", Dynamic::from("config from cloud.resource")),
            ]),
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(!response.diagnostics.is_empty());
}
