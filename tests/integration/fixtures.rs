// tests/integration/fixtures.rs - Fixture graph lifecycle against the mock API

use anyhow::Result;
use pretty_assertions::assert_eq;

use ocl_conformance::{Actor, Fixtures};

use crate::helpers::assertions::{assert_in_order, assert_token};
use crate::helpers::mock_server::{start_mock_api, MockOclApi};
use crate::helpers::{client_for, fast_config};
use crate::integration::{print_test_header, print_test_success};

async fn ready_fixtures() -> Result<(MockOclApi, Fixtures)> {
    let (mock, base_url) = start_mock_api().await;
    let config = fast_config(&base_url);
    let mut fixtures = Fixtures::new(client_for(&config), config);
    fixtures.setup().await?;
    Ok((mock, fixtures))
}

#[tokio::test]
async fn test_setup_builds_graph_in_order() -> Result<()> {
    print_test_header("fixture setup", "🏗️");
    let (mock, f) = ready_fixtures().await?;

    assert_eq!(f.token(Actor::Staff), Some("tok-root"));
    assert_eq!(f.token(Actor::Member), Some(format!("tok-{}", f.member_user.id).as_str()));
    assert_eq!(f.token(Actor::Anonymous), None);

    let requests = mock.requests().await;
    assert_eq!(requests[0].path, "/users/login/");
    assert_in_order(
        &requests,
        &[
            f.private_admin_org.url.as_str(),
            f.org1.url.as_str(),
            f.private_org.url.as_str(),
            format!("{}members/{}/", f.org1.url, f.member_user.id).as_str(),
            "/orgs/{view}/sources/".replace("{view}", &f.view_org.id).as_str(),
            "/orgs/{view}/collections/".replace("{view}", &f.view_org.id).as_str(),
            format!("{}concepts/", f.private_org1_owned_source.url).as_str(),
        ],
    );

    let org1_delete = requests
        .iter()
        .find(|r| r.method == "DELETE" && r.path == f.org1.url)
        .expect("member deletes Org-1 before recreating it");
    assert_token(org1_delete, &f.member_user.id);

    let user_sources = format!("{}sources/", f.non_member_user.url);
    let user_source_posts: Vec<_> = requests
        .iter()
        .filter(|r| r.method == "POST" && r.path == user_sources)
        .collect();
    assert_eq!(user_source_posts.len(), 2);
    assert_token(user_source_posts[0], &f.non_member_user.id);
    assert_eq!(user_source_posts[0].body["public_access"], "None");

    let orgs: Vec<_> = requests
        .iter()
        .filter(|r| r.method == "POST" && r.path == "/orgs/")
        .collect();
    assert_eq!(orgs.len(), 5);

    print_test_success("fixture setup");
    Ok(())
}

#[tokio::test]
async fn test_teardown_deletes_children_first() -> Result<()> {
    let (mock, f) = ready_fixtures().await?;
    mock.clear_requests().await;

    f.teardown().await?;

    let deletes = mock.requests_with("DELETE").await;
    assert_eq!(deletes.len(), 25);
    assert_eq!(deletes[0].path, f.private_org1_owned_concept_2.url);
    assert_eq!(deletes[24].path, f.member_user.url);
    assert!(deletes.iter().all(|r| r.authorization.as_deref() == Some("Token tok-root")));
    assert_in_order(
        &deletes,
        &[
            f.private_org1_owned_source.url.as_str(),
            f.view_org.url.as_str(),
            f.non_member_user.url.as_str(),
        ],
    );
    Ok(())
}

#[tokio::test]
async fn test_after_each_deletes_newest_first() -> Result<()> {
    let (mock, f) = ready_fixtures().await?;
    mock.clear_requests().await;

    f.cleanup(["/orgs/first/", "/orgs/second/"]).await;
    f.cleanup([String::from("/orgs/third/")]).await;
    f.after_each().await?;

    let paths: Vec<String> = mock.requests_with("DELETE").await.into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/orgs/third/", "/orgs/second/", "/orgs/first/"]);

    mock.clear_requests().await;
    f.after_each().await?;
    assert!(mock.requests().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_refused_delete_does_not_fail_cleanup() -> Result<()> {
    let (mock, f) = ready_fixtures().await?;
    mock.respond("DELETE", "/orgs/stuck/", 500, serde_json::json!({})).await;
    mock.clear_requests().await;

    f.cleanup(["/orgs/stuck/", "/orgs/fine/"]).await;
    f.after_each().await?;

    assert_eq!(mock.requests_with("DELETE").await.len(), 2);
    Ok(())
}
