#![allow(clippy::unwrap_used)]
// Integration tests for `DockerContainerSource` using wiremock.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use labeldns_core::Error;
use labeldns_core::traits::ContainerSource;
use labeldns_docker::DockerContainerSource;

const LABEL: &str = "docker-compose-external-dns.1";

async fn setup() -> (MockServer, DockerContainerSource) {
    let server = MockServer::start().await;
    let source = DockerContainerSource::new(server.uri()).unwrap();
    (server, source)
}

#[tokio::test]
async fn test_list_containers_filters_by_label() {
    let (server, source) = setup().await;

    Mock::given(method("GET"))
        .and(path("/containers/json"))
        .and(query_param("filters", r#"{"label":["docker-compose-external-dns.1"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Id": "c0ffee",
                "Names": ["/web"],
                "Image": "nginx",
                "State": "running",
                "Labels": {
                    LABEL: r#"[{"type":"A","name":"a.example.com","address":"DDNS","proxied":false}]"#,
                    "com.docker.compose.service": "web"
                }
            },
            {
                "Id": "beef",
                "Names": ["/db"],
                "Labels": { LABEL: "[]" }
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let containers = source.list_containers(LABEL).await.unwrap();

    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0].id, "c0ffee");
    assert!(containers[0].label(LABEL).unwrap().contains("a.example.com"));
    assert_eq!(
        containers[0].label("com.docker.compose.service"),
        Some("web")
    );
    assert_eq!(containers[1].label(LABEL), Some("[]"));
}

#[tokio::test]
async fn test_empty_list() {
    let (server, source) = setup().await;

    Mock::given(method("GET"))
        .and(path("/containers/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(source.list_containers(LABEL).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_error_is_a_container_error() {
    let (server, source) = setup().await;

    Mock::given(method("GET"))
        .and(path("/containers/json"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "daemon unavailable" })),
        )
        .mount(&server)
        .await;

    let result = source.list_containers(LABEL).await;
    assert!(
        matches!(&result, Err(Error::Container(msg)) if msg.contains("daemon unavailable")),
        "expected Container error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_engine() {
    let source = DockerContainerSource::new("http://127.0.0.1:9").unwrap();

    let result = source.list_containers(LABEL).await;
    assert!(matches!(result, Err(Error::Container(_))));
}
