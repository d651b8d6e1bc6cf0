use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use withlimits::config::WithLimitsConfig;
use withlimits::{
    GateCache, GateKey, LimitHeaders, MemoryCache, RequestDispatcher, ReqwestTransport,
    WithLimitsError,
};

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::new(Duration::from_secs(5), "withlimits-test").unwrap())
}

#[tokio::test]
async fn test_exhausted_limit_blocks_following_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("X-RateLimit", "5")
                .append_header("X-RateLimit", "60")
                .insert_header("X-RateLimit-Count", "5"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let dispatcher = RequestDispatcher::new(transport(), cache.clone())
        .with_base_uri(server.uri())
        .path("/users")
        .with_limit(|limit| {
            limit.system("github").endpoint("/users").header("X-RateLimit");
        });

    let first = dispatcher.send().await.unwrap();
    assert!(first.response().unwrap().is_success());

    let key = GateKey::new("github", "/users");
    assert!(cache.get(&key, false).await.unwrap());
    let ttl = cache.ttl(&key).unwrap();
    assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(55));

    for _ in 0..3 {
        assert!(dispatcher.send().await.unwrap().is_blocked());
    }
    // `expect(1)` is verified when the server drops.
}

#[tokio::test]
async fn test_under_limit_keeps_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit", "100, 60")
                .insert_header("X-RateLimit-Count", "3"),
        )
        .expect(3)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let dispatcher = RequestDispatcher::new(transport(), cache.clone())
        .with_base_uri(server.uri())
        .path("/users")
        .with_limit(|limit| {
            limit.system("github").endpoint("/users").header("X-RateLimit");
        });

    for _ in 0..3 {
        assert!(!dispatcher.send().await.unwrap().is_blocked());
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_split_headers_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-RateLimit-Limit", "30")
                .insert_header("X-RateLimit-Reset", "10")
                .insert_header("X-RateLimit-Used", "30"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::new(transport(), Arc::new(MemoryCache::new()))
        .with_base_uri(server.uri())
        .path("/search")
        .method(http::Method::POST)
        .with_limit(|limit| {
            limit.system("github").endpoint("/search").headers(LimitHeaders::split(
                "X-RateLimit-Limit",
                "X-RateLimit-Reset",
                "X-RateLimit-Used",
            ));
        });

    let response = dispatcher.send().await.unwrap().into_response().unwrap();
    assert_eq!(response.status, http::StatusCode::TOO_MANY_REQUESTS);

    let err = dispatcher.send().await.unwrap().into_response().unwrap_err();
    assert!(matches!(err, WithLimitsError::RateLimitExceeded { .. }));
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let cache = Arc::new(MemoryCache::new());
    let dispatcher = RequestDispatcher::new(transport(), cache.clone())
        .with_base_uri("http://127.0.0.1:9")
        .path("/users")
        .with_limit(|limit| {
            limit.system("local").endpoint("/users").header("X-RateLimit");
        });

    let err = dispatcher.send().await.unwrap_err();
    assert!(matches!(err, WithLimitsError::Transport(_)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_dispatcher_from_yaml_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Quota", "2, 30")
                .insert_header("X-Quota-Count", "2"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let yaml = format!(
        "client:\n  base_uri: {}\ngates:\n  - system: example\n    endpoint: /orgs\n    header: X-Quota\n",
        server.uri()
    );
    let config = WithLimitsConfig::from_yaml(&yaml).unwrap();
    let cache = Arc::new(MemoryCache::new());
    let transport = Arc::new(config.client.build_transport().unwrap());

    let dispatcher = config.dispatcher("/orgs", transport, cache);
    assert!(!dispatcher.send().await.unwrap().is_blocked());
    assert!(dispatcher.send().await.unwrap().is_blocked());
}
