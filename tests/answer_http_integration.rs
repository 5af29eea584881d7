use serde_json::json;

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use askgenie::answer::{AnswerRequest, AnswerSource, HttpAnswerFetcher};
use askgenie::config::AnswerConfig;
use askgenie::error::GenieError;
use askgenie::sources::CitationKind;

fn fetcher_for(server: &MockServer) -> HttpAnswerFetcher {
    let config = AnswerConfig {
        endpoint: format!("{}/ask", server.uri()),
        ..Default::default()
    };
    HttpAnswerFetcher::new(&config).unwrap()
}

fn assert_fetch_failed(err: anyhow::Error) {
    assert!(
        matches!(err.downcast_ref::<GenieError>(), Some(GenieError::FetchFailed(_))),
        "expected FetchFailed, got {:#}",
        err
    );
}

/// Video results come first, then web results titled by hostname
#[tokio::test]
async fn test_ask_normalizes_citations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .and(body_json(json!({
            "question": "How do volcanoes form?",
            "include_video": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Magma rises through the crust.",
            "youtube_videos": [
                {"title": "Volcanoes 101", "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "description": "intro"},
                {"title": "Eruptions", "url": "https://youtu.be/abcdefghijk", "description": ""}
            ],
            "source_urls": [
                "https://en.wikipedia.org/wiki/Volcano",
                "https://www.usgs.gov/volcanoes"
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let answer = fetcher
        .ask(&AnswerRequest::new("How do volcanoes form?"))
        .await
        .unwrap();

    assert_eq!(answer.text, "Magma rises through the crust.");
    let kinds: Vec<CitationKind> = answer.citations.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CitationKind::Video,
            CitationKind::Video,
            CitationKind::Web,
            CitationKind::Web
        ]
    );
    assert_eq!(answer.citations[0].title, "Volcanoes 101");
    assert_eq!(
        answer.citations[0].video_ref().unwrap().video_id,
        "dQw4w9WgXcQ"
    );
    assert_eq!(answer.citations[2].title, "en.wikipedia.org");
}

/// Null and missing result lists are empty lists
#[tokio::test]
async fn test_ask_accepts_missing_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Just text.",
            "video_results": null
        })))
        .mount(&server)
        .await;

    let answer = fetcher_for(&server)
        .ask(&AnswerRequest::new("q"))
        .await
        .unwrap();
    assert_eq!(answer.text, "Just text.");
    assert!(answer.citations.is_empty());
}

#[tokio::test]
async fn test_ask_server_error_is_fetch_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .ask(&AnswerRequest::new("q"))
        .await
        .unwrap_err();
    assert_fetch_failed(err);
}

#[tokio::test]
async fn test_ask_malformed_body_is_fetch_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "wrong shape"})))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .ask(&AnswerRequest::new("q"))
        .await
        .unwrap_err();
    assert_fetch_failed(err);
}

#[tokio::test]
async fn test_ask_unreachable_is_fetch_failed() {
    let config = AnswerConfig {
        endpoint: "http://127.0.0.1:9/ask".to_string(),
        timeout_seconds: 2,
        ..Default::default()
    };
    let err = HttpAnswerFetcher::new(&config)
        .unwrap()
        .ask(&AnswerRequest::new("q"))
        .await
        .unwrap_err();
    assert_fetch_failed(err);
}

/// Disabling video in config overrides the per-request flag
#[tokio::test]
async fn test_include_video_disabled_by_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .and(body_json(json!({"question": "q", "include_video": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = AnswerConfig {
        endpoint: format!("{}/ask", server.uri()),
        include_video: false,
        ..Default::default()
    };
    HttpAnswerFetcher::new(&config)
        .unwrap()
        .ask(&AnswerRequest::new("q"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_probes_sibling_route() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let status = fetcher_for(&server).health().await.unwrap();
    assert_eq!(status["status"], "ok");
}
