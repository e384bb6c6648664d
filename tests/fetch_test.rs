use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use seeker::fetch::{FetchResult, Fetcher};

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetch_json_parses_a_json_response() {
    let app = Router::new().route(
        "/data",
        get(|| async { Json(serde_json::json!({"ok": true, "n": 3})) }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let result = fetcher.fetch_json(&format!("{base}/data")).await.unwrap();
    let json = result.as_json().unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["n"], 3);
}

#[tokio::test]
async fn non_json_content_type_is_malformed_with_status_and_prefix() {
    let long_body = "rate limited ".repeat(100);
    let body = long_body.clone();
    let app = Router::new().route(
        "/data",
        get(move || async move {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::CONTENT_TYPE, "text/plain")],
                body,
            )
        }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let result = fetcher.fetch_json(&format!("{base}/data")).await.unwrap();
    match result {
        FetchResult::Malformed {
            status,
            body_prefix,
        } => {
            assert_eq!(status, 429);
            assert_eq!(body_prefix.chars().count(), 200);
            assert!(long_body.starts_with(&body_prefix));
        }
        FetchResult::Json(_) => panic!("expected a malformed result"),
    }
}

#[tokio::test]
async fn malformed_responses_are_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/data",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ([(header::CONTENT_TYPE, "text/html")], "<html>nope</html>")
            }
        }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let result = fetcher
        .fetch_json_with_retry(&format!("{base}/data"), 3)
        .await
        .unwrap();
    assert!(matches!(result, FetchResult::Malformed { status: 200, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rendered_fetch_follows_redirect_chains() {
    let app = Router::new()
        .route(
            "/start",
            get(|| async {
                (StatusCode::FOUND, [(header::LOCATION, "/middle")], "").into_response()
            }),
        )
        .route(
            "/middle",
            get(|| async {
                // Relative Location, resolved against the current URL.
                (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "end")], "").into_response()
            }),
        )
        .route("/end", get(|| async { "<html>arrived</html>" }));
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let body = fetcher
        .fetch_rendered(
            &format!("{base}/start"),
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
        .await;
    assert_eq!(body, "<html>arrived</html>");
}

#[tokio::test]
async fn redirect_loops_synthesize_an_error_page() {
    let app = Router::new().route(
        "/loop",
        get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/loop")], "").into_response() }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let body = fetcher
        .fetch_rendered(
            &format!("{base}/loop"),
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
        .await;
    assert!(body.contains("Error fetching content"));
    assert!(body.contains("redirect limit"));
}

#[tokio::test]
async fn losing_the_outer_race_synthesizes_a_timeout_page() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "<html>late</html>"
        }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let body = fetcher
        .fetch_rendered(
            &format!("{base}/slow"),
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await;
    assert!(body.contains("Error fetching content"));
    assert!(body.contains("timed out"));
}

#[tokio::test]
async fn per_request_timeout_degrades_to_an_empty_body() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "<html>late</html>"
        }),
    );
    let base = spawn_server(app).await;

    let fetcher = Fetcher::new().unwrap();
    let body = fetcher
        .fetch_rendered(
            &format!("{base}/slow"),
            Duration::from_millis(50),
            Duration::from_secs(10),
        )
        .await;
    assert_eq!(body, "");
}

#[tokio::test]
async fn transport_failures_are_retried_up_to_the_attempt_cap() {
    // Nothing listens on this port; every attempt is a connection error.
    let fetcher = Fetcher::new().unwrap();
    let result = fetcher
        .fetch_json_with_retry("http://127.0.0.1:9/none", 2)
        .await;
    assert!(result.is_err());
}
