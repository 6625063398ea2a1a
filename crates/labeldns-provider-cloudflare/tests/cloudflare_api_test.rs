#![allow(clippy::unwrap_used)]
// Integration tests for `CloudflareProvider` using wiremock.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use labeldns_core::traits::{DnsProvider, PageCursor, RecordParams};
use labeldns_core::{Error, Zone};
use labeldns_provider_cloudflare::CloudflareProvider;

const TOKEN: &str = "cf-test-token";
const COMMENT: &str = "docker-compose-external-dns.1";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudflareProvider) {
    let server = MockServer::start().await;
    let provider = CloudflareProvider::with_base_url(TOKEN, server.uri()).unwrap();
    (server, provider)
}

fn envelope(result: serde_json::Value, page: u32, total_pages: u32) -> serde_json::Value {
    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
        "result_info": { "page": page, "per_page": 50, "count": 1, "total_pages": total_pages }
    })
}

fn a_params() -> RecordParams {
    RecordParams {
        zone_id: "z1".into(),
        record_type: "A".into(),
        name: "a.example.com".into(),
        content: "192.0.2.1".into(),
        proxied: Some(false),
        priority: None,
        comment: COMMENT.into(),
    }
}

// ── Zone listing ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_zones_first_page() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer cf-test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([{ "id": "z1", "name": "example.com", "status": "active" }]),
            1,
            2,
        )))
        .mount(&server)
        .await;

    let page = provider.list_zones(None).await.unwrap();

    assert_eq!(page.items, vec![Zone::new("z1", "example.com")]);
    assert_eq!(page.next, Some(PageCursor("2".into())));
}

#[tokio::test]
async fn test_list_zones_last_page_has_no_cursor() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([{ "id": "z2", "name": "example.org" }]),
            2,
            2,
        )))
        .mount(&server)
        .await;

    let page = provider
        .list_zones(Some(PageCursor("2".into())))
        .await
        .unwrap();

    assert_eq!(page.items[0].name, "example.org");
    assert!(!page.has_next_page());
}

#[tokio::test]
async fn test_authentication_failure() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = provider.list_zones(None).await;

    assert!(
        matches!(&result, Err(Error::Provider { message, .. }) if message.contains("Authentication failed")),
        "expected authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_an_error() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 9109, "message": "Invalid access token" }],
            "result": null
        })))
        .mount(&server)
        .await;

    let err = provider.list_zones(None).await.unwrap_err();
    assert!(err.to_string().contains("Invalid access token"), "{err}");
}

// ── Record listing ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_records_filters_by_comment() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones/z1/dns_records"))
        .and(query_param("comment.exact", COMMENT))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([
                {
                    "id": "rec1",
                    "type": "A",
                    "name": "a.example.com",
                    "content": "192.0.2.1",
                    "proxied": true,
                    "ttl": 1,
                    "comment": COMMENT
                },
                {
                    "id": "rec2",
                    "type": "MX",
                    "name": "example.com",
                    "content": "mail.example.com",
                    "priority": 10,
                    "comment": COMMENT
                }
            ]),
            1,
            1,
        )))
        .mount(&server)
        .await;

    let page = provider.list_records("z1", COMMENT, None).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].proxied, Some(true));
    assert_eq!(page.items[1].priority, Some(10));
    assert!(page.next.is_none());
}

#[tokio::test]
async fn test_list_records_server_error_is_transient() {
    let (server, provider) = setup().await;

    Mock::given(method("GET"))
        .and(path("/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = provider.list_records("z1", COMMENT, None).await.unwrap_err();
    assert!(err.to_string().contains("transient"), "{err}");
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_record_posts_payload_with_comment() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path("/zones/z1/dns_records"))
        .and(body_json(json!({
            "type": "A",
            "name": "a.example.com",
            "content": "192.0.2.1",
            "proxied": false,
            "comment": COMMENT
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "id": "new" }), 1, 1)),
        )
        .expect(1)
        .mount(&server)
        .await;

    provider.create_record(&a_params()).await.unwrap();
}

#[tokio::test]
async fn test_update_record_puts_to_record_path() {
    let (server, provider) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/zones/z1/dns_records/rec1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "id": "rec1" }), 1, 1)),
        )
        .expect(1)
        .mount(&server)
        .await;

    provider.update_record("rec1", &a_params()).await.unwrap();
}

#[tokio::test]
async fn test_delete_record() {
    let (server, provider) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/zones/z1/dns_records/rec1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "id": "rec1" }), 1, 1)),
        )
        .expect(1)
        .mount(&server)
        .await;

    provider.delete_record("rec1", "z1").await.unwrap();
}

#[tokio::test]
async fn test_rejected_write_reports_conflict() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path("/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(409).set_body_string("record already exists"))
        .mount(&server)
        .await;

    let err = provider.create_record(&a_params()).await.unwrap_err();
    assert!(err.to_string().contains("Conflict"), "{err}");
}
