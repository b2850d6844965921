//! Integration tests for Issue Scout
//!
//! These tests drive the real client against a local mockito server.

use issue_scout::quota::QuotaPolicy;
use issue_scout::{ClientConfig, ClientError, QueryCandidates, QuotaResource, RepositoryClient};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::time::{Duration, Instant};

const REPO: &str = "acme/shop";
const COOLDOWN: Duration = Duration::from_millis(20);

/// Policy that never sleeps, so tests only measure what they ask for
fn quiet_policy() -> QuotaPolicy {
    QuotaPolicy::default()
        .fallback_delay(Duration::ZERO)
        .moderate_delay(Duration::ZERO)
}

fn test_config(server: &ServerGuard) -> ClientConfig {
    ClientConfig::new("test-token")
        .base_url(server.url())
        .secondary_cooldown(COOLDOWN)
        .quota_policy(quiet_policy())
}

fn test_client(server: &ServerGuard) -> RepositoryClient {
    RepositoryClient::new(test_config(server)).expect("client should build")
}

fn issue_json(id: u64) -> serde_json::Value {
    json!({
        "number": id,
        "title": format!("Story {}", id),
        "body": "As a user I want things",
        "html_url": format!("https://tracker.example.com/{}/issues/{}", REPO, id),
        "user": { "login": "octo", "html_url": "https://tracker.example.com/octo" },
        "labels": [{ "name": "type:story" }],
    })
}

fn search_body(ids: impl IntoIterator<Item = u64>) -> String {
    let items: Vec<_> = ids.into_iter().map(issue_json).collect();
    json!({ "total_count": items.len(), "incomplete_results": false, "items": items }).to_string()
}

fn page_query(query: &str, page: u32) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("q".into(), query.into()),
        Matcher::UrlEncoded("page".into(), page.to_string()),
    ])
}

async fn mock_search_page(
    server: &mut ServerGuard,
    query: &str,
    page: u32,
    status: usize,
    body: String,
) -> Mock {
    server
        .mock("GET", "/search/issues")
        .match_query(page_query(query, page))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

async fn mock_rate_limit(server: &mut ServerGuard) -> Mock {
    let reset = chrono::Utc::now().timestamp() + 3600;
    server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_body(
            json!({
                "resources": {
                    "core": { "limit": 5000, "remaining": 4990, "reset": reset },
                    "search": { "limit": 30, "remaining": 30, "reset": reset }
                }
            })
            .to_string(),
        )
        .create_async()
        .await
}

#[tokio::test]
async fn test_search_collects_every_page_then_stops() {
    let mut server = Server::new_async().await;
    let candidates = QueryCandidates::label_then_title(REPO, "type:story", "[STORY]");
    let label_query = candidates.iter().next().unwrap().to_string();
    let title_query = candidates.iter().nth(1).unwrap().to_string();

    let page1 = mock_search_page(&mut server, &label_query, 1, 200, search_body(1..=100)).await;
    let page2 = mock_search_page(&mut server, &label_query, 2, 200, search_body(101..=200)).await;
    let page3 = mock_search_page(&mut server, &label_query, 3, 200, search_body(201..=250)).await;
    let fallback = server
        .mock("GET", "/search/issues")
        .match_query(Matcher::UrlEncoded("q".into(), title_query))
        .expect(0)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let records = client.search(&candidates).await.unwrap();

    assert_eq!(records.len(), 250);
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    assert_eq!(records[0].title, "Story 1");
    assert_eq!(
        records[0].url,
        "https://tracker.example.com/acme/shop/issues/1"
    );
    assert_eq!(records[0].labels, vec!["type:story"]);

    page1.assert_async().await;
    page2.assert_async().await;
    page3.assert_async().await;
    fallback.assert_async().await;
}

#[tokio::test]
async fn test_search_falls_back_to_title_candidate() {
    let mut server = Server::new_async().await;
    let candidates = QueryCandidates::label_then_title(REPO, "type:story", "[STORY]");
    let label_query = candidates.iter().next().unwrap().to_string();
    let title_query = candidates.iter().nth(1).unwrap().to_string();

    let empty = mock_search_page(&mut server, &label_query, 1, 200, search_body([])).await;
    let found = mock_search_page(&mut server, &title_query, 1, 200, search_body([7, 9])).await;

    let mut client = test_client(&server);
    let records = client.search(&candidates).await.unwrap();

    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![7, 9]);
    empty.assert_async().await;
    found.assert_async().await;
}

#[tokio::test]
async fn test_search_with_no_matches_is_empty_not_error() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["first query", "second query"].into_iter().collect();

    let first = mock_search_page(&mut server, "first query", 1, 200, search_body([])).await;
    let second = mock_search_page(&mut server, "second query", 1, 200, search_body([])).await;

    let mut client = test_client(&server);
    let records = client.search(&candidates).await.unwrap();

    assert!(records.is_empty());
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_search_validation_error_moves_to_next_candidate() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["bad syntax", "good query"].into_iter().collect();

    let rejected = mock_search_page(
        &mut server,
        "bad syntax",
        1,
        422,
        json!({ "message": "Validation Failed" }).to_string(),
    )
    .await;
    let accepted = mock_search_page(&mut server, "good query", 1, 200, search_body([3])).await;

    let mut client = test_client(&server);
    let records = client.search(&candidates).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 3);
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_search_auth_failure_propagates() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["q"].into_iter().collect();

    let _denied = mock_search_page(
        &mut server,
        "q",
        1,
        401,
        json!({ "message": "Bad credentials" }).to_string(),
    )
    .await;

    let mut client = test_client(&server);
    let err = client.search(&candidates).await.unwrap_err();

    assert!(matches!(err, ClientError::Auth { status: 401, .. }));
    assert!(err.to_string().contains("Bad credentials"));
}

#[tokio::test]
async fn test_search_missing_collection_is_not_found() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["repo:acme/gone type:issue", "fallback"].into_iter().collect();

    let missing = mock_search_page(
        &mut server,
        "repo:acme/gone type:issue",
        1,
        404,
        json!({ "message": "Not Found" }).to_string(),
    )
    .await;
    let fallback = server
        .mock("GET", "/search/issues")
        .match_query(Matcher::UrlEncoded("q".into(), "fallback".into()))
        .expect(0)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let result = client.search(&candidates).await;

    assert!(matches!(result, Err(ClientError::NotFound { .. })));
    missing.assert_async().await;
    fallback.assert_async().await;
}

#[tokio::test]
async fn test_search_skips_malformed_items() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["q"].into_iter().collect();

    // Second item has no number; third has braces and escapes inside strings.
    let body = r#"{
        "total_count": 3,
        "items": [
            {"number": 1, "title": "Plain", "html_url": "https://t/1", "labels": []},
            {"title": "No number", "html_url": "https://t/2", "labels": []},
            {"number": 3, "title": "Braces {inside} and \"quotes\"", "body": null,
             "html_url": "https://t/3", "labels": [{"name": "a}b"}]}
        ]
    }"#;
    let _page = mock_search_page(&mut server, "q", 1, 200, body.to_string()).await;

    let mut client = test_client(&server);
    let records = client.search(&candidates).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 1);
    assert_eq!(records[1].id, 3);
    assert_eq!(records[1].title, "Braces {inside} and \"quotes\"");
    assert_eq!(records[1].body, "");
    assert_eq!(records[1].labels, vec!["a}b"]);
}

#[tokio::test]
async fn test_search_headers_update_quota_and_drive_throttle() {
    let mut server = Server::new_async().await;
    let candidates: QueryCandidates = ["q"].into_iter().collect();
    let reset = (chrono::Utc::now().timestamp() + 600).to_string();

    let _page1 = server
        .mock("GET", "/search/issues")
        .match_query(page_query("q", 1))
        .with_status(200)
        .with_header("x-ratelimit-remaining", "25")
        .with_header("x-ratelimit-limit", "30")
        .with_header("x-ratelimit-reset", &reset)
        .with_header("x-ratelimit-resource", "search")
        .with_body(search_body(1..=2))
        .create_async()
        .await;
    let _page2 = server
        .mock("GET", "/search/issues")
        .match_query(page_query("q", 2))
        .with_status(200)
        .with_header("x-ratelimit-remaining", "24")
        .with_header("x-ratelimit-reset", &reset)
        .with_header("x-ratelimit-resource", "search")
        .with_body(search_body([3]))
        .create_async()
        .await;

    let policy = QuotaPolicy::default()
        .fallback_delay(Duration::ZERO)
        .moderate_delay(Duration::from_millis(150));
    let config = test_config(&server).page_size(2).quota_policy(policy);
    let mut client = RepositoryClient::new(config).unwrap();

    let started = Instant::now();
    let records = client.search(&candidates).await.unwrap();

    assert_eq!(records.len(), 3);
    // 25 remaining is in the moderate band, so page 2 waited.
    assert!(started.elapsed() >= Duration::from_millis(150));

    let search = client.quota(QuotaResource::Search).unwrap();
    assert_eq!(search.remaining, 24);
    assert!(client.quota(QuotaResource::Core).is_none());
}

#[tokio::test]
async fn test_create_returns_stored_record() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let created = server
        .mock("POST", "/repos/acme/shop/issues")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({
            "title": "Story 42",
            "labels": ["type:story"]
        })))
        .with_status(201)
        .with_body(issue_json(42).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let record = client
        .create(REPO, "Story 42", "As a user I want things", &["type:story".to_string()])
        .await
        .unwrap();

    assert_eq!(record.id, 42);
    assert_eq!(record.title, "Story 42");
    assert!(record.has_label("TYPE:STORY"));
    created.assert_async().await;

    // The status probe ran before the write.
    assert_eq!(client.quota(QuotaResource::Core).unwrap().remaining, 4990);
}

#[tokio::test]
async fn test_create_retries_secondary_limit_exactly_once() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let limited = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(403)
        .with_body(
            json!({ "message": "You have exceeded a secondary rate limit. Please wait." })
                .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let started = Instant::now();
    let err = client.create(REPO, "Story", "", &[]).await.unwrap_err();

    assert!(err.is_secondary_rate_limit());
    assert_eq!(err.status(), Some(403));
    assert!(started.elapsed() >= COOLDOWN);
    limited.assert_async().await;
}

#[tokio::test]
async fn test_create_succeeds_after_one_secondary_limit() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let limited = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(403)
        .with_body("secondary rate limit")
        .expect(1)
        .create_async()
        .await;
    let created = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(201)
        .with_body(issue_json(5).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let record = client.create(REPO, "Story 5", "", &[]).await.unwrap();

    assert_eq!(record.id, 5);
    limited.assert_async().await;
    created.assert_async().await;
}

#[tokio::test]
async fn test_create_other_rejections_are_not_retried() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let missing = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(404)
        .with_body(json!({ "message": "Not Found" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let err = client.create(REPO, "Story", "", &[]).await.unwrap_err();

    assert!(matches!(err, ClientError::NotFound { .. }));
    missing.assert_async().await;
}

#[tokio::test]
async fn test_create_with_unreadable_response_is_parse_error() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let _created = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(201)
        .with_body(json!({ "id": 99, "title": "No number" }).to_string())
        .create_async()
        .await;

    let mut client = test_client(&server);
    let err = client.create(REPO, "No number", "", &[]).await.unwrap_err();

    assert!(matches!(err, ClientError::Parse(_)));
}

#[tokio::test]
async fn test_create_proceeds_when_status_probe_fails() {
    let mut server = Server::new_async().await;
    let probe = server
        .mock("GET", "/rate_limit")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let created = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(201)
        .with_body(issue_json(8).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let record = client.create(REPO, "Story 8", "", &[]).await.unwrap();

    assert_eq!(record.id, 8);
    probe.assert_async().await;
    created.assert_async().await;
}

#[tokio::test]
async fn test_create_rereads_quota_after_headerless_response() {
    let mut server = Server::new_async().await;
    let reset = (chrono::Utc::now().timestamp() + 3600).to_string();

    let _user = server
        .mock("GET", "/user")
        .with_status(200)
        .with_header("x-ratelimit-remaining", "4999")
        .with_header("x-ratelimit-reset", &reset)
        .with_body(json!({ "login": "octo" }).to_string())
        .create_async()
        .await;
    let _listing = server
        .mock("GET", "/repos/acme/shop/issues")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let probe = server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_body(
            json!({
                "resources": {
                    "core": { "limit": 5000, "remaining": 4100, "reset": reset.parse::<i64>().unwrap() }
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let created = server
        .mock("POST", "/repos/acme/shop/issues")
        .with_status(201)
        .with_body(issue_json(11).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    assert!(client.check_connectivity().await);
    assert_eq!(client.quota(QuotaResource::Core).unwrap().remaining, 4999);

    // The listing response carries no quota headers.
    assert!(client.list(REPO, &[]).await.unwrap().is_empty());

    let record = client.create(REPO, "Story 11", "", &[]).await.unwrap();
    assert_eq!(record.id, 11);
    assert_eq!(client.quota(QuotaResource::Core).unwrap().remaining, 4100);
    probe.assert_async().await;
    created.assert_async().await;
}

#[tokio::test]
async fn test_append_comment() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let comment = server
        .mock("POST", "/repos/acme/shop/issues/42/comments")
        .match_body(Matcher::Json(json!({ "body": "Linked to the epic" })))
        .with_status(201)
        .with_body(json!({ "id": 1 }).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    client
        .append_comment(REPO, 42, "Linked to the epic")
        .await
        .unwrap();

    comment.assert_async().await;
}

#[tokio::test]
async fn test_append_comment_retries_secondary_limit_once() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let limited = server
        .mock("POST", "/repos/acme/shop/issues/42/comments")
        .with_status(429)
        .with_body("You have triggered a Secondary Rate Limit")
        .expect(2)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let err = client.append_comment(REPO, 42, "hi").await.unwrap_err();

    assert!(err.is_secondary_rate_limit());
    limited.assert_async().await;
}

#[tokio::test]
async fn test_connectivity_success_records_quota() {
    let mut server = Server::new_async().await;
    let reset = (chrono::Utc::now().timestamp() + 3600).to_string();

    let user = server
        .mock("GET", "/user")
        .with_status(200)
        .with_header("x-ratelimit-remaining", "4999")
        .with_header("x-ratelimit-limit", "5000")
        .with_header("x-ratelimit-reset", &reset)
        .with_header("x-ratelimit-resource", "core")
        .with_body(json!({ "login": "octo", "id": 1 }).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    assert!(client.check_connectivity().await);

    let core = client.quota(QuotaResource::Core).unwrap();
    assert_eq!(core.remaining, 4999);
    assert_eq!(core.limit, Some(5000));
    user.assert_async().await;
}

#[tokio::test]
async fn test_connectivity_failure_is_false() {
    let mut server = Server::new_async().await;
    let _user = server
        .mock("GET", "/user")
        .with_status(401)
        .with_body(json!({ "message": "Bad credentials" }).to_string())
        .create_async()
        .await;

    let mut client = test_client(&server);
    assert!(!client.check_connectivity().await);
}

#[tokio::test]
async fn test_connectivity_unreachable_host_is_false() {
    let config = ClientConfig::new("test-token")
        .base_url("http://127.0.0.1:1")
        .timeout(Duration::from_secs(2))
        .quota_policy(quiet_policy());
    let mut client = RepositoryClient::new(config).unwrap();

    assert!(!client.check_connectivity().await);
}

#[tokio::test]
async fn test_refresh_quota_reads_both_resources() {
    let mut server = Server::new_async().await;
    let _quota = mock_rate_limit(&mut server).await;

    let mut client = test_client(&server);
    client.refresh_quota().await.unwrap();

    assert_eq!(client.quota(QuotaResource::Core).unwrap().remaining, 4990);
    assert_eq!(client.quota(QuotaResource::Search).unwrap().limit, Some(30));
}

#[tokio::test]
async fn test_list_skips_pull_requests() {
    let mut server = Server::new_async().await;

    let mut pull = issue_json(2);
    pull["pull_request"] = json!({ "url": "https://t/pulls/2" });
    let body = json!([issue_json(1), pull, issue_json(3)]).to_string();

    let listing = server
        .mock("GET", "/repos/acme/shop/issues")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("state".into(), "open".into()),
            Matcher::UrlEncoded("labels".into(), "type:story,ui".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(body)
        .expect(1)
        .create_async()
        .await;

    let mut client = test_client(&server);
    let labels = vec!["type:story".to_string(), "ui".to_string()];
    let records = client.list(REPO, &labels).await.unwrap();

    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 3]);
    listing.assert_async().await;
}

#[test]
fn test_empty_credential_rejected() {
    let result = RepositoryClient::new(ClientConfig::new(""));
    assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_invalid_collection_rejected_without_request() {
    let server = Server::new_async().await;
    let mut client = test_client(&server);

    let err = client.create("not-a-collection", "t", "", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));
}
