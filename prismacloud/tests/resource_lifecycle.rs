use mockito::{Matcher, Server};
use prismacloud::api::{Client, RetryConfig};
use prismacloud::data_sources::{
    AccountGroupDataSource, ComplianceStandardRequirementSectionDataSource,
};
use prismacloud::poll::PollConfig;
use prismacloud::resources::{AccountGroupResource, CloudAccountResource, PolicyResource};
use prismacloud::PrismaCloudProviderData;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, DataSource, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest, ReadResourceRequest,
    Resource, ResourceWithConfigure,
};
use tfplug::types::{ClientCapabilities, Dynamic, DynamicValue};

fn provider_data(server: &Server) -> PrismaCloudProviderData {
    let retry = RetryConfig {
        max_retries: 0,
        initial_backoff_ms: 1,
        max_backoff_ms: 1,
        timeout_seconds: 5,
    };
    let client =
        Client::with_config(&server.url(), "key-id", "secret", None, false, retry).unwrap();
    let poll = PollConfig {
        initial_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        multiplier: 2.0,
        timeout: Duration::from_secs(2),
    };
    PrismaCloudProviderData::new(client, poll)
}

async fn configured_resource(server: &Server) -> AccountGroupResource {
    let mut resource = AccountGroupResource::new();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(Arc::new(provider_data(server))),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

async fn mock_login(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await
}

fn group_state(id: &str, name: &str) -> DynamicValue {
    let mut state = DynamicValue::empty_object();
    state.set_attribute("id", id);
    state.set_attribute("group_id", id);
    state.set_attribute("name", name);
    state
}

#[tokio::test]
async fn create_waits_until_group_is_readable() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;

    let create = server
        .mock("POST", "/cloud/group")
        .match_body(Matcher::PartialJsonString(r#"{"name":"prod"}"#.to_string()))
        .with_body("")
        .expect(1)
        .create_async()
        .await;
    let names = server
        .mock("GET", "/cloud/group/name")
        .with_body(r#"[{"id":"ag-1","name":"prod"},{"id":"ag-2","name":"dev"}]"#)
        .create_async()
        .await;
    let get = server
        .mock("GET", "/cloud/group/ag-1")
        .with_body(
            r#"{"id":"ag-1","name":"prod","description":"","accountIds":["111"],
                "lastModifiedBy":"me@example.com","lastModifiedTs":1700000000000}"#,
        )
        .create_async()
        .await;

    let resource = configured_resource(&server).await;

    let mut planned = DynamicValue::empty_object();
    planned.set_attribute("name", "prod");
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                planned_state: planned.clone(),
                config: planned,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.new_state;
    assert_eq!(state.attribute("id").as_str(), Some("ag-1"));
    assert_eq!(state.attribute("group_id").as_str(), Some("ag-1"));
    assert_eq!(
        state.attribute("last_modified_by").as_str(),
        Some("me@example.com")
    );
    assert_eq!(
        state.attribute("account_ids").as_list().map(|ids| ids.len()),
        Some(1)
    );
    create.assert_async().await;
    names.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn read_of_deleted_group_clears_state() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _missing = server
        .mock("GET", "/cloud/group/ag-1")
        .with_status(404)
        .create_async()
        .await;

    let resource = configured_resource(&server).await;
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                current_state: group_state("ag-1", "prod"),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty());
    assert!(response.new_state.is_none());
}

#[tokio::test]
async fn read_failure_keeps_state_and_reports() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _forbidden = server
        .mock("GET", "/cloud/group/ag-1")
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;

    let resource = configured_resource(&server).await;
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                current_state: group_state("ag-1", "prod"),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].is_error());
    assert!(response.new_state.is_some());
}

#[tokio::test]
async fn delete_of_missing_group_succeeds() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let delete = server
        .mock("DELETE", "/cloud/group/ag-1")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let resource = configured_resource(&server).await;
    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                prior_state: group_state("ag-1", "prod"),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty());
    delete.assert_async().await;
}

#[tokio::test]
async fn unconfigured_resource_reports_error() {
    let resource = AccountGroupResource::new();
    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                prior_state: group_state("ag-1", "prod"),
            },
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn data_source_looks_up_by_name() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _names = server
        .mock("GET", "/cloud/group/name")
        .with_body(r#"[{"id":"ag-2","name":"dev"}]"#)
        .create_async()
        .await;
    let _get = server
        .mock("GET", "/cloud/group/ag-2")
        .with_body(r#"{"id":"ag-2","name":"dev","description":"development"}"#)
        .create_async()
        .await;

    let mut data_source = AccountGroupDataSource::new();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(Arc::new(provider_data(&server))),
            },
        )
        .await;

    let mut config = DynamicValue::empty_object();
    config.set_attribute("name", "dev");
    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.state.attribute("group_id").as_str(), Some("ag-2"));
    assert_eq!(
        response.state.attribute("description").as_str(),
        Some("development")
    );
}

#[tokio::test]
async fn data_source_without_lookup_key_is_an_error() {
    let server = Server::new_async().await;

    let mut data_source = AccountGroupDataSource::new();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(Arc::new(provider_data(&server))),
            },
        )
        .await;

    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                config: DynamicValue::empty_object(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].is_error());
}

async fn configured_data_source(server: &Server) -> AccountGroupDataSource {
    let mut data_source = AccountGroupDataSource::new();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(Arc::new(provider_data(server))),
            },
        )
        .await;
    data_source
}

async fn read_group(
    data_source: &AccountGroupDataSource,
    group_id: &str,
    name: &str,
) -> ReadDataSourceResponse {
    let mut config = DynamicValue::empty_object();
    config.set_attribute("group_id", group_id);
    config.set_attribute("name", name);
    data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "prismacloud_account_group".to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await
}

#[tokio::test]
async fn data_source_with_stale_id_falls_back_to_name() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let stale = server
        .mock("GET", "/cloud/group/stale")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let names = server
        .mock("GET", "/cloud/group/name")
        .with_body(r#"[{"id":"ag-2","name":"dev"}]"#)
        .expect(1)
        .create_async()
        .await;
    let _get = server
        .mock("GET", "/cloud/group/ag-2")
        .with_body(r#"{"id":"ag-2","name":"dev","description":"development"}"#)
        .create_async()
        .await;

    let data_source = configured_data_source(&server).await;
    let response = read_group(&data_source, "stale", "dev").await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.state.attribute("group_id").as_str(), Some("ag-2"));
    stale.assert_async().await;
    names.assert_async().await;
}

#[tokio::test]
async fn data_source_missing_by_id_and_name_reports() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _stale = server
        .mock("GET", "/cloud/group/stale")
        .with_status(404)
        .create_async()
        .await;
    let _names = server
        .mock("GET", "/cloud/group/name")
        .with_body(r#"[{"id":"ag-1","name":"prod"}]"#)
        .create_async()
        .await;

    let data_source = configured_data_source(&server).await;
    let response = read_group(&data_source, "stale", "dev").await;

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].is_error());
}

fn aws_account_state() -> DynamicValue {
    let mut block = HashMap::new();
    block.insert("account_id".to_string(), Dynamic::from("111"));
    block.insert("name".to_string(), Dynamic::from("prod"));
    block.insert("enabled".to_string(), Dynamic::from(true));
    block.insert("group_ids".to_string(), Dynamic::List(vec![]));
    block.insert("external_id".to_string(), Dynamic::from("ext"));
    block.insert(
        "role_arn".to_string(),
        Dynamic::from("arn:aws:iam::111:role/prisma"),
    );
    block.insert("account_type".to_string(), Dynamic::from("account"));

    let mut state = DynamicValue::empty_object();
    state.set_attribute("aws", Dynamic::List(vec![Dynamic::Map(block)]));
    state.set_attribute("azure", Dynamic::List(vec![]));
    state.set_attribute("gcp", Dynamic::List(vec![]));
    state.set_attribute("alibaba_cloud", Dynamic::List(vec![]));
    state
}

#[tokio::test]
async fn cloud_account_lifecycle_uses_composite_id() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;

    let create = server
        .mock("POST", "/cloud/aws")
        .match_body(Matcher::PartialJsonString(
            r#"{"accountId":"111","externalId":"ext"}"#.to_string(),
        ))
        .with_body("")
        .expect(1)
        .create_async()
        .await;
    // Not visible right after the POST
    let pending = server
        .mock("GET", "/cloud/aws/111")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let mut resource = CloudAccountResource::new();
    resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(Arc::new(provider_data(&server))),
            },
        )
        .await;

    let planned = aws_account_state();
    let created = {
        let visible = server
            .mock("GET", "/cloud/aws/111")
            .with_body(
                r#"{"accountId":"111","enabled":true,"externalId":"ext","groupIds":null,
                    "name":"prod","roleArn":"arn:aws:iam::111:role/prisma",
                    "accountType":"account","protectionMode":"MONITOR"}"#,
            )
            .create_async()
            .await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "prismacloud_cloud_account".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        visible.assert_async().await;
        response.new_state
    };

    create.assert_async().await;
    pending.assert_async().await;
    assert_eq!(created.attribute("id").as_str(), Some("aws.111"));

    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "prismacloud_cloud_account".to_string(),
                current_state: created.clone(),
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.new_state.unwrap();
    let aws = state.attribute("aws").as_list().unwrap();
    assert_eq!(aws.len(), 1);
    assert_eq!(
        aws[0].as_map().unwrap()["protection_mode"].as_str(),
        Some("MONITOR")
    );

    let delete = server
        .mock("DELETE", "/cloud/aws/111")
        .expect(1)
        .create_async()
        .await;
    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "prismacloud_cloud_account".to_string(),
                prior_state: state,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    delete.assert_async().await;
}

fn policy_plan() -> DynamicValue {
    let mut rule = HashMap::new();
    rule.insert("name".to_string(), Dynamic::from("custom rule"));
    rule.insert(
        "criteria".to_string(),
        Dynamic::from("config from cloud.resource where api.name = 'aws-s3api-get-bucket-acl'"),
    );
    rule.insert(
        "parameters".to_string(),
        Dynamic::Map(HashMap::from([(
            "savedSearch".to_string(),
            Dynamic::from("false"),
        )])),
    );
    rule.insert("rule_type".to_string(), Dynamic::from("Config"));

    let mut plan = DynamicValue::empty_object();
    plan.set_attribute("name", "custom");
    plan.set_attribute("policy_type", "config");
    plan.set_attribute("severity", "high");
    plan.set_attribute("enabled", true);
    plan.set_attribute("rule", Dynamic::List(vec![Dynamic::Map(rule)]));
    plan
}

#[tokio::test]
async fn policy_create_without_id_identifies_by_name() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;

    let create = server
        .mock("POST", "/policy")
        .match_body(Matcher::PartialJsonString(r#"{"name":"custom"}"#.to_string()))
        .with_body("")
        .expect(1)
        .create_async()
        .await;
    let by_name = server
        .mock("GET", "/policy")
        .match_query(Matcher::UrlEncoded(
            "policy.name".to_string(),
            "custom".to_string(),
        ))
        .with_body(
            r#"[{"policyId":"p-1","name":"custom","rule":{"name":"custom rule","criteria":"x",
                "parameters":{},"ruleType":"Config"}}]"#,
        )
        .expect(1)
        .create_async()
        .await;
    let get = server
        .mock("GET", "/policy/p-1")
        .with_body(
            r#"{"policyId":"p-1","name":"custom","policyType":"config","severity":"high",
                "enabled":true,"rule":{"name":"custom rule","criteria":"x",
                "parameters":{"savedSearch":"false"},"ruleType":"Config"}}"#,
        )
        .create_async()
        .await;

    let mut resource = PolicyResource::new();
    resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(Arc::new(provider_data(&server))),
            },
        )
        .await;

    let planned = policy_plan();
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "prismacloud_policy".to_string(),
                planned_state: planned.clone(),
                config: planned,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.new_state.attribute("policy_id").as_str(), Some("p-1"));
    assert_eq!(response.new_state.attribute("id").as_str(), Some("p-1"));
    create.assert_async().await;
    by_name.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn section_data_source_finds_section_within_requirement() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let sections = server
        .mock("GET", "/compliance/csr-1/section")
        .with_body(
            r#"[{"id":"sec-1","sectionId":"1.1","description":"first","viewOrder":1},
                {"id":"sec-2","sectionId":"1.2","description":"second","viewOrder":2}]"#,
        )
        .expect(2)
        .create_async()
        .await;

    let mut data_source = ComplianceStandardRequirementSectionDataSource::new();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(Arc::new(provider_data(&server))),
            },
        )
        .await;

    let mut config = DynamicValue::empty_object();
    config.set_attribute("csr_id", "csr-1");
    config.set_attribute("section_id", "1.2");
    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "prismacloud_compliance_standard_requirement_section".to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.state.attribute("csrs_id").as_str(), Some("sec-2"));
    assert_eq!(response.state.attribute("description").as_str(), Some("second"));
    sections.assert_async().await;
}
