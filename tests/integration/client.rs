// tests/integration/client.rs - HTTP client against the mock API

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use ocl_conformance::{ApiClient, ConformanceError};

use crate::helpers::mock_server::start_mock_api;
use crate::helpers::{client_for, fast_config};
use crate::integration::{print_test_header, print_test_success};

#[tokio::test]
async fn test_get_sends_limit_token_and_content_type() -> Result<()> {
    print_test_header("GET request shape", "🌐");
    let (mock, base_url) = start_mock_api().await;
    let client = client_for(&fast_config(&base_url));

    let response = client.get("sources/", Some("abc")).await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!([]));

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/sources/");
    assert_eq!(requests[0].query, "limit=1000");
    assert_eq!(requests[0].authorization.as_deref(), Some("Token abc"));
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));

    print_test_success("GET request shape");
    Ok(())
}

#[tokio::test]
async fn test_get_keeps_existing_query() -> Result<()> {
    let (mock, base_url) = start_mock_api().await;
    let mut config = fast_config(&base_url);
    config.server.page_limit = 25;
    let client = client_for(&config);

    client.get("sources/?verbose=true", None).await?;

    let requests = mock.requests().await;
    assert_eq!(requests[0].path, "/sources/");
    assert_eq!(requests[0].query, "verbose=true&limit=25");
    assert!(requests[0].authorization.is_none());
    Ok(())
}

#[tokio::test]
async fn test_authenticate() -> Result<()> {
    print_test_header("login", "🔑");
    let (_mock, base_url) = start_mock_api().await;
    let client = client_for(&fast_config(&base_url));

    assert_eq!(client.authenticate_admin().await?, "tok-root");
    assert_eq!(client.authenticate("root", "wrong").await?, None);

    let mut config = fast_config(&base_url);
    config.server.admin_password = "wrong".to_string();
    let bad_admin = ApiClient::new(&config)?;
    assert!(matches!(
        bad_admin.authenticate_admin().await,
        Err(ConformanceError::Authentication { username }) if username == "root"
    ));

    print_test_success("login");
    Ok(())
}

#[tokio::test]
async fn test_new_user_creates_then_reactivates() -> Result<()> {
    let (mock, base_url) = start_mock_api().await;
    let client = client_for(&fast_config(&base_url));

    let created = client.new_user("alice", "alice", "tok-root").await?;
    assert_eq!(created["username"], "alice");
    assert_eq!(client.authenticate("alice", "alice").await?.as_deref(), Some("tok-alice"));

    let requests = mock.requests().await;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/users/");
    assert_eq!(requests[0].body["email"], "alice@openconceptlab.org");
    assert_eq!(requests[1].method, "PUT");
    assert_eq!(requests[1].path, "/users/alice/reactivate/");
    assert_eq!(requests[1].authorization.as_deref(), Some("Token tok-root"));
    Ok(())
}

#[tokio::test]
async fn test_status_expectations() -> Result<()> {
    let (mock, base_url) = start_mock_api().await;
    mock.respond("DELETE", "/orgs/OCL/", 403, json!({ "detail": "Forbidden" })).await;
    let client = client_for(&fast_config(&base_url));

    let denied = client.delete("orgs/OCL/", None).await?;
    assert!(denied.expect_any_status(&[401, 403]).is_ok());
    let err = denied.expect_status(204).unwrap_err();
    assert!(err.is_assertion());
    assert!(err.to_string().contains("expected 204, got 403"));

    client.new_user("other", "other", "tok-root").await?;
    let deleted = client.delete("users/other/", Some("tok-root")).await?;
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.body, Value::Null);

    let missing = client.delete("orgs/Other/", Some("tok-root")).await?;
    assert_eq!(missing.status, 404);
    Ok(())
}

#[tokio::test]
async fn test_transport_error_for_unreachable_server() {
    let client = client_for(&fast_config("http://127.0.0.1:1"));
    let result = client.get("orgs/", None).await;
    assert!(matches!(result, Err(ConformanceError::Transport(_))));
}
