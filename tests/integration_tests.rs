//! Integration Tests for the aggregation run
//!
//! Uses wiremock for mocking the three provider APIs.
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_aggregator::aggregator::RunStatus;
use news_aggregator::config::Config;
use news_aggregator::harvester::{build_connectors, Harvester};
use news_aggregator::http_client::ResilientHttpClient;
use news_aggregator::schemas::{EntityKind, DEFAULT_CATEGORIES};
use news_aggregator::storage::{ArticleStore, MemoryStore};

const NYT_PATH: &str = "/svc/topstories/v2/home.json";

fn newsapi_body() -> serde_json::Value {
    json!({
        "status": "ok",
        "totalResults": 1,
        "articles": [{
            "source": {"id": "bbc-news", "name": "BBC News"},
            "author": "Zoe Kleinman",
            "title": "Chip makers race to build smaller transistors",
            "description": "The industry pushes past 2nm.",
            "url": "https://www.bbc.co.uk/news/technology-1?utm_source=newsapi",
            "urlToImage": "https://ichef.bbci.co.uk/1.jpg",
            "publishedAt": "2025-01-01T10:00:00Z",
            "content": "Full text"
        }]
    })
}

fn guardian_body() -> serde_json::Value {
    json!({
        "response": {
            "status": "ok",
            "total": 2,
            "results": [
                {
                    "webUrl": "https://www.theguardian.com/world/2025/jan/01/a",
                    "webTitle": "Guardian story A",
                    "webPublicationDate": "2025-01-01T08:00:00Z",
                    "pillarName": "News",
                    "fields": {"trailText": "A summary", "thumbnail": "https://media.guim.co.uk/a.jpg"},
                    "tags": [{"type": "contributor", "webTitle": "Jane Reporter"}]
                },
                {
                    "webUrl": "https://www.theguardian.com/sport/2025/jan/01/b",
                    "webTitle": "Guardian story B",
                    "webPublicationDate": "2025-01-01T09:00:00Z",
                    "pillarName": "Sport",
                    "tags": []
                }
            ]
        }
    })
}

fn nyt_body() -> serde_json::Value {
    json!({
        "status": "OK",
        "results": [{
            "section": "technology",
            "title": "Robots Learn to Fold Laundry",
            "abstract": "A breakthrough in home robotics.",
            "url": "https://www.nytimes.com/2025/01/01/technology/robots.html",
            "byline": "By Cade Metz",
            "published_date": "2025-01-01T05:00:03-05:00",
            "multimedia": [{"url": "https://static01.nyt.com/super.jpg", "format": "superJumbo"}]
        }]
    })
}

/// Serves one article for the Technology query and nothing for the rest
async fn mount_newsapi(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/everything"))
        .and(query_param("q", "Technology"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/everything"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "totalResults": 0, "articles": []})),
        )
        .mount(server)
        .await;
}

async fn mount_guardian(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("order-by", "newest"))
        .and(query_param("show-tags", "contributor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(guardian_body()))
        .mount(server)
        .await;
}

async fn mount_nyt(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(NYT_PATH))
        .and(query_param("q", "Technology"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nyt_body()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(NYT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK", "results": []})))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer) -> Config {
    Config {
        newsapi_key: Some("newsapi-key".to_string()),
        newsapi_base_url: server.uri(),
        newsapi_cooldown_ms: 0,
        guardian_api_key: Some("guardian-key".to_string()),
        guardian_base_url: server.uri(),
        nyt_api_key: Some("nyt-key".to_string()),
        nyt_base_url: format!("{}{}", server.uri(), NYT_PATH),
        http_max_retries: 0,
        ..Config::default()
    }
}

fn harvester(config: Config, store: Arc<MemoryStore>) -> Harvester {
    let client = Arc::new(ResilientHttpClient::new(config.http_client_config()).unwrap());
    let connectors = build_connectors(&config, client);
    Harvester::from_parts(config, "integration".to_string(), store, connectors)
}

#[tokio::test]
async fn test_full_aggregation_run() {
    let server = MockServer::start().await;
    mount_newsapi(&server).await;
    mount_guardian(&server).await;
    mount_nyt(&server).await;

    let store = Arc::new(MemoryStore::new());
    let harvester = harvester(test_config(&server), store.clone());

    let report = assert_ok!(harvester.run_once(None, false).await);

    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes.iter().all(|o| o.status == RunStatus::Success));
    assert_eq!(report.total_stored(), 4);

    let articles = store.articles();
    assert_eq!(articles.len(), 4);
    let bbc_article = store
        .find_article_by_url("https://www.bbc.co.uk/news/technology-1")
        .await
        .unwrap()
        .expect("tracking parameters are stripped from the stored url");
    assert_eq!(bbc_article.title, "Chip makers race to build smaller transistors");

    let sources: Vec<String> = store.entities(EntityKind::Source).into_iter().map(|e| e.name).collect();
    assert_eq!(sources.len(), 3);
    assert!(sources.contains(&"BBC News".to_string()));
    assert!(sources.contains(&"The Guardian".to_string()));
    assert!(sources.contains(&"The New York Times".to_string()));

    let bbc = store.find_entity(EntityKind::Source, "BBC News").await.unwrap().unwrap();
    assert_eq!(bbc.external_id.as_deref(), Some("bbc-news"));

    let authors: Vec<String> = store.entities(EntityKind::Author).into_iter().map(|e| e.name).collect();
    assert!(authors.contains(&"Jane Reporter".to_string()));
    assert!(authors.contains(&"Guardian Staff".to_string()));
    assert!(authors.contains(&"Cade Metz".to_string()));

    // Seeded defaults plus the two Guardian pillars
    let categories = store.entities(EntityKind::Category);
    assert_eq!(categories.len(), DEFAULT_CATEGORIES.len() + 2);
}

#[tokio::test]
async fn test_provider_failure_is_isolated() {
    let server = MockServer::start().await;
    mount_newsapi(&server).await;
    mount_nyt(&server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let harvester = harvester(test_config(&server), store.clone());
    let report = assert_ok!(harvester.run_once(None, false).await);

    let guardian = report.outcome("guardian").unwrap();
    assert_eq!(guardian.status, RunStatus::Failed);
    assert_eq!(guardian.fetched, 0);
    assert_eq!(guardian.failed_queries, 1);
    assert_eq!(guardian.failures, 1);

    assert_eq!(report.outcome("newsapi").unwrap().created, 1);
    assert_eq!(report.outcome("nyt").unwrap().created, 1);
    assert_eq!(store.articles().len(), 2);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_newsapi(&server).await;
    mount_guardian(&server).await;
    mount_nyt(&server).await;

    let store = Arc::new(MemoryStore::new());
    let harvester = harvester(test_config(&server), store.clone());

    let first = assert_ok!(harvester.run_once(None, false).await);
    let counts_after_first = store.counts().await.unwrap();

    let second = assert_ok!(harvester.run_once(None, true).await);
    let counts_after_second = store.counts().await.unwrap();

    assert_eq!(counts_after_first, counts_after_second);
    assert_eq!(first.outcomes.iter().map(|o| o.created).sum::<usize>(), 4);
    assert_eq!(second.outcomes.iter().map(|o| o.created).sum::<usize>(), 0);
    assert_eq!(second.outcomes.iter().map(|o| o.updated).sum::<usize>(), 4);
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/everything"))
        .and(query_param("q", "Business"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "articles": [
                {"source": {"name": "Reuters"}, "title": "No link here", "publishedAt": "2025-01-01T00:00:00Z"},
                {"source": {"name": "Reuters"}, "title": "Bad date", "url": "https://reuters.com/2", "publishedAt": "yesterday"},
                {"source": {"name": "Reuters"}, "title": "Fine", "url": "https://reuters.com/3", "publishedAt": "2025-01-01 12:00:00"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "articles": []})))
        .mount(&server)
        .await;

    let config = Config {
        guardian_api_key: None,
        nyt_api_key: None,
        ..test_config(&server)
    };
    let store = Arc::new(MemoryStore::new());
    let harvester = harvester(config, store.clone());
    let report = assert_ok!(harvester.run_once(Some("newsapi"), false).await);

    let outcome = report.outcome("newsapi").unwrap();
    assert_eq!(outcome.fetched, 3);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.status, RunStatus::Partial);

    let articles = store.articles();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].url, "https://reuters.com/3");
    // The bad-date record must not leave an author or source behind either
    assert_eq!(store.entities(EntityKind::Source).len(), 1);
}

#[tokio::test]
async fn test_newsapi_error_status_fails_every_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid"
        })))
        .mount(&server)
        .await;

    let config = Config {
        guardian_api_key: None,
        nyt_api_key: None,
        ..test_config(&server)
    };
    let store = Arc::new(MemoryStore::new());
    let report = assert_ok!(harvester(config, store.clone()).run_once(None, false).await);

    let outcome = report.outcome("newsapi").unwrap();
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.failed_queries, DEFAULT_CATEGORIES.len());
    assert!(outcome.last_error.as_deref().unwrap().contains("apiKeyInvalid"));
    assert!(store.articles().is_empty());
}

#[tokio::test]
async fn test_single_provider_selection() {
    let server = MockServer::start().await;
    mount_guardian(&server).await;

    let store = Arc::new(MemoryStore::new());
    let harvester = harvester(test_config(&server), store.clone());
    let report = assert_ok!(harvester.run_once(Some("guardian"), false).await);

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcome("guardian").unwrap().created, 2);
    assert!(harvester.run_once(Some("bloomberg"), false).await.is_err());
}
