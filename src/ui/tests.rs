use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use tower::ServiceExt;

const TITLE: &str = "Kenyan Business Search Tool";

struct ScriptedAnswerer {
    calls: AtomicUsize,
    fail: bool,
}

impl ScriptedAnswerer {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl Answerer for ScriptedAnswerer {
    async fn answer(&self, query: &str) -> Result<Answer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QaError::Answer("Client error: HTTP 401".to_string()));
        }
        Ok(Answer {
            text: format!("You asked <{}>", query),
            sources: vec!["https://nation.africa/kenya/business?a=1&b=2".to_string()],
        })
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

fn search_request(form_body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/search")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body.to_string()))
        .expect("should build request")
}

#[tokio::test]
async fn index_renders_idle_form() {
    let answerer = ScriptedAnswerer::new(false);
    let app = router(Arc::clone(&answerer) as Arc<dyn Answerer>, TITLE);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).expect("should build request"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("<h1>Kenyan Business Search Tool</h1>"));
    assert!(body.contains("name=\"query\""));
    assert!(body.contains("How it works"));
    assert!(!body.contains("<h2>Answer</h2>"));
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_displays_escaped_answer_and_sources() {
    let answerer = ScriptedAnswerer::new(false);
    let app = router(Arc::clone(&answerer) as Arc<dyn Answerer>, TITLE);

    let response = app
        .oneshot(search_request("query=maize+%3Cprices%3E"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Your question: maize &lt;prices&gt;"));
    assert!(body.contains("You asked &lt;maize &lt;prices&gt;&gt;"));
    assert!(body.contains("<h2>Sources</h2>"));
    assert!(body.contains("https://nation.africa/kenya/business?a=1&amp;b=2"));
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_query_stays_idle() {
    let answerer = ScriptedAnswerer::new(false);
    let app = router(Arc::clone(&answerer) as Arc<dyn Answerer>, TITLE);

    let response = app
        .oneshot(search_request("query=+++"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(!body.contains("<h2>Answer</h2>"));
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_search_renders_error_page() {
    let answerer = ScriptedAnswerer::new(true);
    let app = router(Arc::clone(&answerer) as Arc<dyn Answerer>, TITLE);

    let response = app
        .oneshot(search_request("query=rates"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("<h2>Error</h2>"));
    assert!(body.contains("Client error: HTTP 401"));
    assert!(body.contains("How it works"));
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = router(ScriptedAnswerer::new(false), TITLE);

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("should build request"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn submit_trims_query() {
    let answerer = ScriptedAnswerer::new(false);

    let state = SearchState::submit(answerer.as_ref(), "  tea  ").await;
    assert_eq!(
        state,
        SearchState::Displaying {
            query: "tea".to_string(),
            answer: Answer {
                text: "You asked <tea>".to_string(),
                sources: vec!["https://nation.africa/kenya/business?a=1&b=2".to_string()],
            },
        }
    );

    assert_eq!(SearchState::submit(answerer.as_ref(), "").await, SearchState::Idle);
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn render_page_escapes_title() {
    let page = render_page("News & <Views>", &SearchState::Idle);
    assert!(page.contains("<title>News &amp; &lt;Views&gt;</title>"));
}
