//! Integration tests for the GCP adapter using wiremock
//!
//! Every API is routed to one mock server through `GcpEndpoints::single`,
//! so the whole enumeration flow runs against canned responses.

use lcloud::config::OptionBlock;
use lcloud::provider::gcp::auth::GcpCredentials;
use lcloud::provider::gcp::client::{GcpClient, GcpEndpoints};
use lcloud::provider::gcp::{GcpProvider, GcpService};
use lcloud::{Provider, ResourceKind, TaskDispatcher};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "test-project";
const TOKEN: &str = "test-token";

fn provider(server: &MockServer, services: Vec<GcpService>) -> GcpProvider {
    let endpoints = GcpEndpoints::single(&server.uri()).expect("mock server uri is valid");
    let client = GcpClient::new(GcpCredentials::from_static_token(TOKEN), PROJECT, endpoints)
        .expect("client builds");
    GcpProvider::from_client("mock", client, services, TaskDispatcher::new(2))
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(bearer_token(TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// (kind, value) pairs of a result, sorted by value
fn kinds(resources: Vec<lcloud::Resource>) -> Vec<(ResourceKind, String)> {
    let mut out: Vec<_> = resources
        .into_iter()
        .map(|r| (r.kind(), r.value().unwrap_or_default().to_string()))
        .collect();
    out.sort_by(|a, b| a.1.cmp(&b.1));
    out
}

mod compute_tests {
    use super::*;

    /// One zone failing must not hide the instances of the others
    #[tokio::test]
    async fn test_zone_failure_is_partial() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/compute/v1/projects/test-project/zones",
            json!({"items": [
                {"name": "us-central1-a", "status": "UP"},
                {"name": "europe-west1-b", "status": "UP"},
                {"name": "asia-east1-c", "status": "DOWN"}
            ]}),
        )
        .await;
        mount_json(
            &server,
            "/compute/v1/projects/test-project/zones/us-central1-a/instances",
            json!({"items": [{
                "name": "web-1",
                "networkInterfaces": [{
                    "networkIP": "10.128.0.2",
                    "accessConfigs": [{"natIP": "34.120.1.1"}]
                }]
            }]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones/europe-west1-b/instances"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Compute Engine API has not been used"}
            })))
            .mount(&server)
            .await;

        let resources = provider(&server, vec![GcpService::Compute])
            .resources(&CancellationToken::new())
            .await
            .expect("zone failures are not account failures");

        assert_eq!(
            kinds(resources.into_items()),
            vec![
                (ResourceKind::PrivateIp, "10.128.0.2".to_string()),
                (ResourceKind::PublicIp, "34.120.1.1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_instances_follow_page_token() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/compute/v1/projects/test-project/zones",
            json!({"items": [{"name": "us-east1-b", "status": "UP"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones/us-east1-b/instances"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"networkInterfaces": [{"networkIP": "10.0.0.3"}]}]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones/us-east1-b/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"networkInterfaces": [{"networkIP": "10.0.0.2"}]}],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resources = provider(&server, vec![GcpService::Compute])
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        let values: Vec<_> = kinds(resources.into_items()).into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["10.0.0.2", "10.0.0.3"]);
    }
}

mod partial_page_tests {
    use super::*;

    /// A later page failing keeps the items of the pages before it
    #[tokio::test]
    async fn test_failed_second_page_keeps_first_page() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/compute/v1/projects/test-project/zones",
            json!({"items": [{"name": "us-east1-b", "status": "UP"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones/us-east1-b/instances"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/compute/v1/projects/test-project/zones/us-east1-b/instances",
            json!({
                "items": [{"networkInterfaces": [{
                    "networkIP": "10.0.0.2",
                    "accessConfigs": [{"natIP": "34.120.9.9"}]
                }]}],
                "nextPageToken": "page-2"
            }),
        )
        .await;

        let resources = provider(&server, vec![GcpService::Compute])
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            kinds(resources.into_items()),
            vec![
                (ResourceKind::PrivateIp, "10.0.0.2".to_string()),
                (ResourceKind::PublicIp, "34.120.9.9".to_string()),
            ]
        );
    }

    /// Functions found before a failing page still unlock the domain
    /// mapping wave for their location
    #[tokio::test]
    async fn test_failed_functions_page_still_lists_domain_mappings() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/v2/projects/test-project/locations",
            json!({"locations": [{"locationId": "us-central1"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/test-project/locations/us-central1/functions"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/v2/projects/test-project/locations/us-central1/functions",
            json!({
                "functions": [{"serviceConfig": {"uri": "https://hello-uc.a.run.app"}}],
                "nextPageToken": "next"
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/locations/us-central1/domainmappings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"metadata": {"name": "api.example.com"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resources = provider(&server, vec![GcpService::Functions])
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        let values: Vec<_> = kinds(resources.into_items()).into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["api.example.com", "hello-uc.a.run.app"]);
    }
}

mod sql_tests {
    use super::*;

    #[tokio::test]
    async fn test_sql_instances_across_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/instances"))
            .and(query_param("pageToken", "more"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"ipAddresses": [{"type": "PRIVATE", "ipAddress": "10.30.0.8"}]}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/v1/projects/test-project/instances",
            json!({
                "items": [{"name": "orders", "ipAddresses": [
                    {"type": "PRIMARY", "ipAddress": "34.66.1.2"},
                    {"type": "PRIVATE", "ipAddress": "10.30.0.7"},
                    {"type": "OUTGOING", "ipAddress": "35.9.9.9"}
                ]}],
                "nextPageToken": "more"
            }),
        )
        .await;

        let resources = provider(&server, vec![GcpService::Sql])
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            kinds(resources.into_items()),
            vec![
                (ResourceKind::PrivateIp, "10.30.0.7".to_string()),
                (ResourceKind::PrivateIp, "10.30.0.8".to_string()),
                (ResourceKind::PublicIp, "34.66.1.2".to_string()),
            ]
        );
    }
}

mod service_tests {
    use super::*;

    async fn mount_all_services(server: &MockServer) {
        mount_json(server, "/compute/v1/projects/test-project/zones", json!({"items": []})).await;
        mount_json(
            server,
            "/storage/v1/b",
            json!({"items": [{"name": "assets-bucket"}, {"name": "logs-bucket"}]}),
        )
        .await;
        mount_json(
            server,
            "/dns/v1/projects/test-project/managedZones",
            json!({"managedZones": [
                {"name": "public-zone", "visibility": "public"},
                {"name": "internal-zone", "visibility": "private"}
            ]}),
        )
        .await;
        mount_json(
            server,
            "/dns/v1/projects/test-project/managedZones/public-zone/rrsets",
            json!({"rrsets": [
                {"name": "www.example.com.", "type": "A", "rrdatas": ["35.1.2.3"]},
                {"name": "assets.example.com.", "type": "CNAME", "rrdatas": ["assets-bucket.storage.googleapis.com."]},
                {"name": "example.com.", "type": "MX", "rrdatas": ["10 mail.example.com."]}
            ]}),
        )
        .await;
        mount_json(
            server,
            "/v2/projects/test-project/locations",
            json!({"locations": [{"locationId": "us-central1"}, {"locationId": "europe-west1"}]}),
        )
        .await;
        mount_json(
            server,
            "/v2/projects/test-project/locations/us-central1/functions",
            json!({"functions": [
                {"serviceConfig": {"uri": "https://hello-abc-uc.a.run.app", "ingressSettings": "ALLOW_ALL"}},
                {"serviceConfig": {"uri": "https://private-abc-uc.a.run.app", "ingressSettings": "ALLOW_INTERNAL_ONLY"}}
            ]}),
        )
        .await;
        mount_json(
            server,
            "/v2/projects/test-project/locations/europe-west1/functions",
            json!({}),
        )
        .await;
        mount_json(
            server,
            "/v1/projects/test-project/locations/us-central1/domainmappings",
            json!({"items": [{"metadata": {"name": "api.example.com"}}]}),
        )
        .await;
        mount_json(
            server,
            "/v1/projects/test-project/instances",
            json!({"items": [{"ipAddresses": [
                {"type": "PRIMARY", "ipAddress": "34.66.1.2"},
                {"type": "PRIVATE", "ipAddress": "10.20.0.3"}
            ]}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project/locations/europe-west1/domainmappings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_all_services_dedup_across_services() {
        let server = MockServer::start().await;
        mount_all_services(&server).await;

        let resources = provider(&server, GcpService::ALL.to_vec())
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            kinds(resources.into_items()),
            vec![
                (ResourceKind::PrivateIp, "10.20.0.3".to_string()),
                (ResourceKind::PublicIp, "34.66.1.2".to_string()),
                (ResourceKind::PublicIp, "35.1.2.3".to_string()),
                (ResourceKind::DnsName, "api.example.com".to_string()),
                (ResourceKind::DnsName, "assets-bucket.storage.googleapis.com".to_string()),
                (ResourceKind::DnsName, "assets.example.com".to_string()),
                (ResourceKind::DnsName, "hello-abc-uc.a.run.app".to_string()),
                (ResourceKind::DnsName, "logs-bucket.storage.googleapis.com".to_string()),
                (ResourceKind::DnsName, "www.example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_service_filter_limits_requests() {
        let server = MockServer::start().await;
        mount_json(&server, "/storage/v1/b", json!({"items": [{"name": "only-bucket"}]})).await;

        let resources = provider(&server, vec![GcpService::Storage])
            .resources(&CancellationToken::new())
            .await
            .unwrap();

        let items = resources.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].dns_name.as_deref(), Some("only-bucket.storage.googleapis.com"));
        assert_eq!(items[0].provider_id, "mock");
        assert_eq!(items[0].provider_name, "gcp");
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_empty_set() {
        let server = MockServer::start().await;
        mount_all_services(&server).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let resources = provider(&server, GcpService::ALL.to_vec())
            .resources(&cancel)
            .await
            .unwrap();
        assert!(resources.is_empty());
    }
}

mod construction_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_from_block_with_endpoint_and_session_token() {
        let server = MockServer::start().await;
        mount_json(&server, "/storage/v1/b", json!({"items": [{"name": "cfg-bucket"}]})).await;

        let uri = server.uri();
        let block: OptionBlock = [
            ("provider", "gcp"),
            ("id", "from-config"),
            ("access_key", PROJECT),
            ("secret_key", "adc"),
            ("session_token", TOKEN),
            ("endpoint", uri.as_str()),
        ]
        .into_iter()
        .collect();

        let provider = GcpProvider::new(&block, &["storage".to_string()], TaskDispatcher::default())
            .await
            .expect("static token needs no network");
        assert_eq!(provider.id(), "from-config");
        assert_eq!(provider.services(), &[GcpService::Storage]);

        let items = provider
            .resources(&CancellationToken::new())
            .await
            .unwrap()
            .into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].dns_name.as_deref(), Some("cfg-bucket.storage.googleapis.com"));
    }

    #[tokio::test]
    async fn test_missing_key_file_is_credentials_error() {
        let block: OptionBlock = [
            ("provider", "gcp"),
            ("access_key", PROJECT),
            ("secret_key", "/nonexistent/sa-key.json"),
        ]
        .into_iter()
        .collect();

        let err = GcpProvider::new(&block, &[], TaskDispatcher::default())
            .await
            .err()
            .expect("unreadable key file must fail");
        assert!(matches!(err, lcloud::error::ProviderError::Credentials(_)));
    }
}
