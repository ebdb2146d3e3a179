mod common;

use common::{content_len, is_error, pat, resource, text};
use hub_mcp_openapi_tools::AuthConfig;
use hub_mcp_openapi_tools::executor::UNAUTHENTICATED_NOTICE;
use hub_mcp_test_support::{CannedResponse, MockUpstream};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const LOGIN: &str = "/v2/users/login";
const REPO_PATH: &str = "/namespaces/library/repositories/nginx";

fn repo_args() -> serde_json::Value {
    json!({"namespace": "library", "repository": "nginx"})
}

#[tokio::test]
async fn bearer_token_is_sent_as_authorization() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = resource(
        &upstream,
        Some(AuthConfig::Bearer {
            token: Some("static-token".to_string()),
        }),
    )?;

    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(!is_error(&result));
    assert_eq!(content_len(&result), 1);
    assert_eq!(
        upstream.requests()[0].header("authorization"),
        Some("Bearer static-token")
    );
    assert_eq!(upstream.count("POST", LOGIN), 0);
    Ok(())
}

#[tokio::test]
async fn configured_auth_without_token_adds_notice() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = resource(&upstream, Some(AuthConfig::Bearer { token: None }))?;

    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(!is_error(&result));
    assert_eq!(content_len(&result), 2);
    assert_eq!(text(&result, 1), UNAUTHENTICATED_NOTICE);
    assert_eq!(upstream.requests()[0].header("authorization"), None);
    Ok(())
}

#[tokio::test]
async fn sequential_pat_calls_log_in_once() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond(
        "POST",
        LOGIN,
        CannedResponse::json(200, json!({"token": "jwt-library", "refresh_token": "r"})),
    );
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = resource(&upstream, Some(pat("alice", "dckr_pat_secret")))?;

    for _ in 0..2 {
        let result = res.execute("getRepositoryInfo", repo_args()).await;
        assert!(!is_error(&result), "{}", text(&result, 0));
    }

    assert_eq!(upstream.count("POST", LOGIN), 1);
    let login = &upstream.requests_to(LOGIN)[0];
    // The namespace argument is the login identity.
    assert_eq!(
        login.json_body(),
        Some(json!({"username": "library", "password": "dckr_pat_secret"}))
    );

    let calls = upstream.requests_to(REPO_PATH);
    assert_eq!(calls.len(), 2);
    for call in calls {
        assert_eq!(call.header("authorization"), Some("Bearer jwt-library"));
    }
    Ok(())
}

#[tokio::test]
async fn pat_identity_falls_back_to_configured_username() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond("POST", LOGIN, CannedResponse::json(200, json!({"token": "jwt-alice"})));
    upstream.respond(
        "GET",
        "/search/repositories",
        CannedResponse::json(200, json!({"results": []})),
    );
    let res = resource(&upstream, Some(pat("alice", "dckr_pat_secret")))?;

    let result = res
        .execute("get_search_repositories", json!({"query": "nginx"}))
        .await;
    assert!(!is_error(&result), "{}", text(&result, 0));

    let login = &upstream.requests_to(LOGIN)[0];
    assert_eq!(login.json_body().unwrap()["username"], "alice");
    assert_eq!(res.auth().cache().get("alice").as_deref(), Some("jwt-alice"));
    Ok(())
}

#[tokio::test]
async fn concurrent_pat_calls_share_one_login() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond(
        "POST",
        LOGIN,
        CannedResponse::json(200, json!({"token": "jwt"})).with_delay(Duration::from_millis(150)),
    );
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = Arc::new(resource(&upstream, Some(pat("alice", "dckr_pat_secret")))?);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let res = Arc::clone(&res);
        handles.push(tokio::spawn(async move {
            res.execute("getRepositoryInfo", repo_args()).await
        }));
    }
    for h in handles {
        let result = h.await?;
        assert!(!is_error(&result), "{}", text(&result, 0));
    }

    assert_eq!(upstream.count("POST", LOGIN), 1);
    assert_eq!(upstream.count("GET", REPO_PATH), 5);
    Ok(())
}

#[tokio::test]
async fn failed_login_is_an_error_result_and_retried_next_call() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond(
        "POST",
        LOGIN,
        CannedResponse::json(401, json!({"detail": "Incorrect authentication credentials"})),
    );
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = resource(&upstream, Some(pat("alice", "wrong")))?;

    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(is_error(&result));
    assert!(text(&result, 0).starts_with("Error executing API call: Authentication error:"));
    assert_eq!(upstream.count("GET", REPO_PATH), 0);

    upstream.respond("POST", LOGIN, CannedResponse::json(200, json!({"token": "jwt"})));
    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(!is_error(&result), "{}", text(&result, 0));
    assert_eq!(upstream.count("POST", LOGIN), 2);
    Ok(())
}

#[tokio::test]
async fn login_without_token_still_dispatches_unauthenticated() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond("POST", LOGIN, CannedResponse::json(200, json!({"refresh_token": "r"})));
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let res = resource(&upstream, Some(pat("alice", "dckr_pat_secret")))?;

    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(!is_error(&result), "{}", text(&result, 0));
    assert_eq!(content_len(&result), 2);
    assert_eq!(text(&result, 1), UNAUTHENTICATED_NOTICE);

    let calls = upstream.requests_to(REPO_PATH);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].header("authorization"), None);

    // Nothing was cached, so the next call logs in again.
    res.execute("getRepositoryInfo", repo_args()).await;
    assert_eq!(upstream.count("POST", LOGIN), 2);
    Ok(())
}

#[tokio::test]
async fn unauthorized_response_evicts_cached_token() -> anyhow::Result<()> {
    let upstream = MockUpstream::start().await?;
    upstream.respond("POST", LOGIN, CannedResponse::json(200, json!({"token": "stale"})));
    upstream.respond(
        "GET",
        REPO_PATH,
        CannedResponse::json(401, json!({"detail": "token expired"})),
    );
    let res = resource(&upstream, Some(pat("alice", "dckr_pat_secret")))?;

    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(is_error(&result));
    assert!(text(&result, 0).starts_with("API call failed with status 401: "));
    // The failing call itself is not retried.
    assert_eq!(upstream.count("GET", REPO_PATH), 1);
    assert!(res.auth().cache().get("library").is_none());

    upstream.respond("POST", LOGIN, CannedResponse::json(200, json!({"token": "fresh"})));
    upstream.respond("GET", REPO_PATH, CannedResponse::json(200, json!({"name": "nginx"})));
    let result = res.execute("getRepositoryInfo", repo_args()).await;
    assert!(!is_error(&result));

    assert_eq!(upstream.count("POST", LOGIN), 2);
    assert_eq!(
        upstream.requests_to(REPO_PATH)[1].header("authorization"),
        Some("Bearer fresh")
    );
    Ok(())
}
