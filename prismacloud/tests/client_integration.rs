use mockito::{Matcher, Server};
use prismacloud::api::{ApiError, Client, RetryConfig};

fn test_client(server: &Server) -> Client {
    let retry = RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 5,
    };
    Client::with_config(&server.url(), "key-id", "secret", None, false, retry).unwrap()
}

#[tokio::test]
async fn login_once_and_send_token() {
    let mut server = Server::new_async().await;

    let login = server
        .mock("POST", "/login")
        .match_body(Matcher::PartialJsonString(
            r#"{"username":"key-id","password":"secret"}"#.to_string(),
        ))
        .with_body(r#"{"token":"tok-1","message":"login_successful"}"#)
        .expect(1)
        .create_async()
        .await;
    let groups = server
        .mock("GET", "/cloud/group")
        .match_header("x-redlock-auth", "tok-1")
        .with_body(r#"[{"id":"ag-1","name":"prod","accountIds":null}]"#)
        .expect(2)
        .create_async()
        .await;

    let client = test_client(&server);
    let first = client.account_groups().list().await.unwrap();
    let second = client.account_groups().list().await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "prod");
    assert!(first[0].account_ids.is_empty());
    assert_eq!(second.len(), 1);
    login.assert_async().await;
    groups.assert_async().await;
}

#[tokio::test]
async fn rejected_token_triggers_one_login() {
    let mut server = Server::new_async().await;

    let first_login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"stale"}"#)
        .expect(1)
        .create_async()
        .await;
    let second_login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let rejected = server
        .mock("GET", "/cloud/group/ag-1")
        .match_header("x-redlock-auth", "stale")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/cloud/group/ag-1")
        .match_header("x-redlock-auth", "fresh")
        .with_body(r#"{"id":"ag-1","name":"prod"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    let group = client.account_groups().get("ag-1").await.unwrap();

    assert_eq!(group.id, "ag-1");
    first_login.assert_async().await;
    second_login.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn failed_login_is_an_auth_error() {
    let mut server = Server::new_async().await;

    let _login = server
        .mock("POST", "/login")
        .with_status(401)
        .with_body(r#"{"message":"invalid_credentials"}"#)
        .create_async()
        .await;

    let client = test_client(&server);
    let err = client.account_groups().list().await.unwrap_err();

    assert!(matches!(err, ApiError::AuthError(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let mut server = Server::new_async().await;

    let _login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/cloud/group/gone")
        .with_status(404)
        .create_async()
        .await;
    let _status_header = server
        .mock("GET", "/policy/gone")
        .with_status(400)
        .with_header(
            "x-redlock-status",
            r#"[{"i18nKey":"policy_not_found","severity":"error","subject":null}]"#,
        )
        .create_async()
        .await;

    let client = test_client(&server);

    let err = client.account_groups().get("gone").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");

    let err = client.policies().get("gone").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let mut server = Server::new_async().await;

    let _login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await;
    let unavailable = server
        .mock("GET", "/cloud/group")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let client = test_client(&server);
    let err = client.account_groups().list().await.unwrap_err();

    assert!(matches!(err, ApiError::ServiceUnavailable), "got {err:?}");
    unavailable.assert_async().await;
}

#[tokio::test]
async fn client_errors_carry_status_messages() {
    let mut server = Server::new_async().await;

    let _login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await;
    let conflict = server
        .mock("POST", "/cloud/group")
        .with_status(409)
        .with_header(
            "x-redlock-status",
            r#"[{"i18nKey":"account_group_name_already_exists","severity":"error"}]"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    let group = prismacloud::api::account_group::AccountGroup {
        name: "prod".to_string(),
        ..Default::default()
    };
    let err = client.account_groups().create(&group).await.unwrap_err();

    match err {
        ApiError::ApiError {
            status, message, ..
        } => {
            assert_eq!(status, 409);
            assert_eq!(message, "account_group_name_already_exists");
        }
        other => panic!("unexpected error {other:?}"),
    }
    conflict.assert_async().await;
}

#[tokio::test]
async fn empty_create_response_reads_as_none() {
    let mut server = Server::new_async().await;

    let _login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await;
    let _create = server
        .mock("POST", "/cloud/group")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let client = test_client(&server);
    let group = prismacloud::api::account_group::AccountGroup {
        name: "prod".to_string(),
        ..Default::default()
    };
    let created = client.account_groups().create(&group).await.unwrap();

    assert!(created.is_none());
}

#[tokio::test]
async fn concurrent_first_requests_share_one_login() {
    let mut server = Server::new_async().await;

    let login = server
        .mock("POST", "/login")
        .with_body(r#"{"token":"tok"}"#)
        .expect(1)
        .create_async()
        .await;
    let groups = server
        .mock("GET", "/cloud/group")
        .match_header("x-redlock-auth", "tok")
        .with_body("[]")
        .expect(4)
        .create_async()
        .await;

    let client = test_client(&server);
    let (g1, g2, g3, g4) = (
        client.account_groups(),
        client.account_groups(),
        client.account_groups(),
        client.account_groups(),
    );
    let (a, b, c, d) = tokio::join!(g1.list(), g2.list(), g3.list(), g4.list());

    for result in [a, b, c, d] {
        assert!(result.unwrap().is_empty());
    }
    login.assert_async().await;
    groups.assert_async().await;
}
