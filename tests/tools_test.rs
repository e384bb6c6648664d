use axum::http::header;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use seeker::cache::{CacheStore, MemoryBackend};
use seeker::config::{SearchSettings, Settings};
use seeker::fetch::Fetcher;
use seeker::tools::ToolRegistry;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn memory_store() -> CacheStore {
    CacheStore::new(Arc::new(MemoryBackend::new()))
}

fn settings_with_search(base: &str) -> Settings {
    let mut settings = Settings::from_env(&Default::default());
    settings.search = SearchSettings {
        searxng_url: Some(base.to_string()),
        serper_api_key: None,
    };
    settings
}

fn search_fixture(hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/search",
        get(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "results": [
                        {"title": "A", "url": "https://a.example.com/1", "content": "alpha"},
                        {"title": "B", "url": "https://b.example.org/2", "content": "beta"},
                        {"title": "C", "url": "https://c.example.com/3", "content": "gamma"},
                    ],
                    "number_of_results": 3
                }))
            }
        }),
    )
}

#[tokio::test]
async fn search_results_are_served_from_cache_on_repeat() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_server(search_fixture(hits.clone())).await;

    let settings = settings_with_search(&base);
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );

    let args = json!({"query": "example", "max_results": 5});
    let first = registry.execute("search", &args).await.unwrap();
    let second = registry.execute("search", &args).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first["number_of_results"], 3);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_parameters_miss_the_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_server(search_fixture(hits.clone())).await;

    let settings = settings_with_search(&base);
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );

    registry
        .execute("search", &json!({"query": "example", "max_results": 5}))
        .await
        .unwrap();
    registry
        .execute("search", &json!({"query": "example", "max_results": 3}))
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn search_applies_domain_filters() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_server(search_fixture(hits)).await;

    let settings = settings_with_search(&base);
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );

    let result = registry
        .execute(
            "search",
            &json!({"query": "example", "exclude_domains": ["b.example.org"]}),
        )
        .await
        .unwrap();
    let urls: Vec<&str> = result["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["https://a.example.com/1", "https://c.example.com/3"]);
    assert_eq!(result["number_of_results"], 2);
}

#[tokio::test]
async fn search_failure_returns_the_error_envelope() {
    let app = Router::new().route(
        "/search",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>down</html>") }),
    );
    let base = spawn_server(app).await;

    let settings = settings_with_search(&base);
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );

    let result = registry
        .execute("search", &json!({"query": "example"}))
        .await
        .unwrap();
    assert_eq!(result["message"], "Internal Server Error");
    assert_eq!(result["query"], "example");
    assert_eq!(result["number_of_results"], 0);
    assert!(result["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn registry_contents_follow_configuration() {
    let mut settings = Settings::from_env(&Default::default());
    settings.search = SearchSettings {
        searxng_url: None,
        serper_api_key: None,
    };
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );
    // Only the retriever has no external requirements.
    assert_eq!(registry.names(), vec!["retrieve"]);

    settings.search.searxng_url = Some("http://localhost:8080".to_string());
    settings.search.serper_api_key = Some("serper-key".to_string());
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );
    assert_eq!(registry.names(), vec!["retrieve", "search", "video_search"]);
}

#[tokio::test]
async fn retrieve_reduces_a_page_to_text() {
    let app = Router::new().route(
        "/page",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "text/html")],
                "<html><head><title>Docs</title></head><body><h1>Heading</h1><p>Body text here.</p></body></html>",
            )
        }),
    );
    let base = spawn_server(app).await;

    let settings = settings_with_search(&base);
    let registry = ToolRegistry::from_settings(
        &settings,
        Arc::new(Fetcher::new().unwrap()),
        memory_store(),
    );

    let result = registry
        .execute("retrieve", &json!({"url": format!("{base}/page")}))
        .await
        .unwrap();
    let page = &result["results"][0];
    assert_eq!(page["title"], "Docs");
    let content = page["content"].as_str().unwrap();
    assert!(content.contains("Body text here."));
    assert!(!content.contains("<p>"));
}
