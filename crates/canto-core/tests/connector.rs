//! End-to-end connector tests against a mock Canto instance.
//!
//! One mock server plays both the `OAuth2` endpoint (under `/oauth`) and
//! the REST API (under `/api/v1`); sessions authenticate with the
//! client-credentials grant.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use canto_core::{
    ApiClient, AssetProxyCache, AssetProxyRepository, AssetUpdateService, AuthorizationRepository,
    CantoConfig, LocalAsset, OAuthSession, RetagOutcome, TagFilter, WebhookReceiver,
    retag_used_assets,
};
use canto_oauth::{OAuthClient, Provider};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server_uri: &str, auto_tagging: bool) -> CantoConfig {
    serde_json::from_value(serde_json::json!({
        "apiBaseUri": format!("{server_uri}/api/v1"),
        "oAuthBaseUri": format!("{server_uri}/oauth"),
        "appId": "app",
        "appSecret": "secret",
        "customFields": {
            "prop1": { "asCollection": true, "valuesAsTags": true }
        },
        "webhook": { "pathPrefix": "/canto/webhook/", "token": "hook-secret" },
        "autoTagging": { "enabled": auto_tagging }
    }))
    .unwrap()
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "service-token",
            "expiresIn": 3600,
            "tokenType": "Bearer"
        })))
        .mount(server)
        .await;
}

async fn repository(server: &MockServer, auto_tagging: bool) -> AssetProxyRepository {
    let config = Arc::new(config(&server.uri(), auto_tagging));
    let provider = Provider::new(&config.o_auth_base_uri).unwrap();
    let oauth = OAuthClient::new(&config.app_id, &config.app_secret, provider);
    let store = AuthorizationRepository::in_memory().await.unwrap();
    let session = OAuthSession::new(oauth, store, "canto").allow_client_credentials(true);

    let client = Arc::new(ApiClient::new(&config.api_base_uri, session).unwrap());
    let cache = Arc::new(AssetProxyCache::new());
    AssetProxyRepository::new(client, cache, config)
}

fn image_asset(tags: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "scheme": "image",
        "id": "42",
        "name": "sunset.jpg",
        "size": 1_048_576,
        "width": 4000,
        "height": 3000,
        "tag": tags,
        "default": { "Date modified": "20210618115334027" },
        "url": {
            "directUrlPreview": "https://acme.canto.global/direct/image/abc/xyz/800"
        }
    })
}

fn video_asset() -> serde_json::Value {
    serde_json::json!({
        "scheme": "video",
        "id": "7",
        "name": "clip.mp4",
        "size": 9_000_000,
        "tag": [],
        "default": { "Date modified": "20220101000000000" },
        "url": {}
    })
}

#[tokio::test]
async fn test_search_materializes_once_and_fills_the_cache() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "found": 2,
            "results": [image_asset(&["beach"]), video_asset()]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    let mut result = repository.find_by_search_term("sunset");
    let proxies = result.to_array().await.unwrap().to_vec();
    assert_eq!(proxies.len(), 2);
    assert_eq!(proxies[0].identifier.to_string(), "image-42");
    assert_eq!(proxies[0].media_type, "image/jpeg");
    assert_eq!(proxies[1].identifier.to_string(), "video-7");

    // Second materialization and the count reuse the first fetch.
    assert_eq!(result.to_array().await.unwrap().len(), 2);
    assert_eq!(result.count().await.unwrap(), 2);

    assert!(repository.cache().has("image-42"));
    assert!(repository.cache().has("video-7"));
}

#[tokio::test]
async fn test_get_asset_proxy_hits_the_remote_only_once() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/image/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_asset(&["beach"])))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    let first = repository.get_asset_proxy("image-42").await.unwrap();
    let second = repository.get_asset_proxy("image-42").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.filename, "sunset.jpg");
}

#[tokio::test]
async fn test_tag_search_counts_through_the_custom_field_filter() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/custom/field"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "prop1", "name": "Nature", "values": ["Sea", "Forest"] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .and(query_param("limit", "1"))
        .and(query_param("prop1.keyword", "\"Sea\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "found": 12, "results": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    let count = repository
        .count_by_tag(TagFilter::new("Sea", ["Nature".to_string()]), None)
        .await
        .unwrap();
    assert_eq!(count, 12);
}

#[tokio::test]
async fn test_direct_uri_uses_the_binary_subdomain() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api_binary/v1/image/42/directuri"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("https://cdn.example.net/binary/42\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api_binary/v1/image/404/directuri"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    let client = repository.client();

    let uri = client.direct_uri(&"image-42".parse().unwrap()).await.unwrap();
    assert_eq!(
        uri.map(|u| u.to_string()),
        Some("https://cdn.example.net/binary/42".to_string())
    );
    assert!(client
        .direct_uri(&"image-404".parse().unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_custom_fields_degrade_to_empty_on_error_status() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/custom/field"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    assert!(repository.client().custom_fields().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_update_refreshes_the_cached_proxy() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/image/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_asset(&["beach", "new"])))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository(&server, false).await;
    repository
        .cache()
        .set("image-42", image_asset(&["beach"]).to_string());

    let receiver = WebhookReceiver::new(
        config(&server.uri(), false).webhook,
        AssetUpdateService::new(repository.clone()),
    );
    let body = serde_json::json!({
        "secure_token": "hook-secret",
        "scheme": "image",
        "id": "42"
    });
    let response = receiver
        .handle("/canto/webhook/update", body.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(response.status, 204);

    // The cache now serves the refreshed metadata without another fetch.
    let proxy = repository.get_asset_proxy("image-42").await.unwrap();
    assert_eq!(proxy.tags, vec!["beach", "new"]);
}

#[tokio::test]
async fn test_webhook_rejects_wrong_token_before_touching_the_cache() {
    let server = MockServer::start().await;
    let repository = repository(&server, false).await;
    repository
        .cache()
        .set("image-42", image_asset(&["beach"]).to_string());

    let receiver = WebhookReceiver::new(
        config(&server.uri(), false).webhook,
        AssetUpdateService::new(repository.clone()),
    );
    let body = serde_json::json!({
        "secure_token": "wrong",
        "scheme": "image",
        "id": "42"
    });
    let response = receiver
        .handle("/canto/webhook/update", body.to_string().as_bytes())
        .await
        .unwrap();
    assert_eq!(response.status, 403);
    assert!(repository.cache().has("image-42"));
}

#[tokio::test]
async fn test_webhook_ignores_foreign_paths_and_rejects_bad_payloads() {
    let server = MockServer::start().await;
    let repository = repository(&server, false).await;
    let receiver = WebhookReceiver::new(
        config(&server.uri(), false).webhook,
        AssetUpdateService::new(repository),
    );

    assert!(receiver.handle("/assets/image-42", b"{}").await.is_none());

    let response = receiver
        .handle("/canto/webhook/update", b"not json")
        .await
        .unwrap();
    assert_eq!(response.status, 400);

    let missing_fields = serde_json::json!({ "secure_token": "hook-secret" });
    let response = receiver
        .handle(
            "/canto/webhook/update",
            missing_fields.to_string().as_bytes(),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_retag_writes_sorted_keywords_for_used_assets() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/image/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_asset(&["summer", "beach"])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/image/42"))
        .and(body_json(serde_json::json!({
            "keywords": "beach,canto-connector-in-use,summer"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository(&server, true).await;
    let config = config(&server.uri(), true);
    let assets = [LocalAsset {
        identifier: "image-42".to_string(),
        label: "Sunset".to_string(),
        usage_count: 3,
    }];

    let report = retag_used_assets(&repository, &config, &assets).await.unwrap();
    assert_eq!(
        report.outcomes,
        vec![("image-42".to_string(), RetagOutcome::Tagged)]
    );
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_retag_continues_past_failing_assets() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/image/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/image/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_asset(&["beach"])))
        .mount(&server)
        .await;

    let repository = repository(&server, true).await;
    let config = config(&server.uri(), true);
    let assets = [
        LocalAsset {
            identifier: "image-404".to_string(),
            label: "Gone".to_string(),
            usage_count: 0,
        },
        LocalAsset {
            identifier: "image-42".to_string(),
            label: "Sunset".to_string(),
            usage_count: 0,
        },
    ];

    let report = retag_used_assets(&repository, &config, &assets).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "image-404");
    // Unused and never tagged: nothing to write.
    assert_eq!(
        report.outcomes,
        vec![("image-42".to_string(), RetagOutcome::Unchanged)]
    );
}

#[tokio::test]
async fn test_retag_requires_auto_tagging_enabled() {
    let server = MockServer::start().await;
    let repository = repository(&server, false).await;
    let config = config(&server.uri(), false);
    assert!(retag_used_assets(&repository, &config, &[]).await.is_err());
}
