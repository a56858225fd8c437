#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests for building the index and answering questions
//!
//! Every external service (news pages, embeddings and chat endpoints) is served
//! by a local mock server, so these tests need no network access or API key.

use serde_json::{Value, json};
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use news_qa::QaError;
use news_qa::app::{AppContext, Answerer};
use news_qa::config::{API_KEY_ENV, Config};
use news_qa::indexer::VectorIndex;

const VOCABULARY: [&str; 8] = [
    "bank", "lending", "maize", "harvest", "safari", "tourists", "rates", "farmers",
];

/// Bag-of-words embeddings over a fixed vocabulary
struct KeywordEmbeddings;

impl Respond for KeywordEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };

        let data: Vec<Value> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .enumerate()
                    .map(|(index, input)| {
                        let text = input.as_str().unwrap_or_default().to_lowercase();
                        let mut embedding: Vec<f32> = VOCABULARY
                            .iter()
                            .map(|word| text.matches(word).count() as f32)
                            .collect();
                        embedding.push(1.0);
                        json!({ "object": "embedding", "index": index, "embedding": embedding })
                    })
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": data,
            "model": body["model"],
        }))
    }
}

/// Chat model that answers with the first context block and cites its source
struct CitingChat;

impl Respond for CitingChat {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };

        let prompt = body["messages"]
            .as_array()
            .and_then(|messages| messages.last())
            .and_then(|message| message["content"].as_str())
            .unwrap_or_default();

        let content = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Content: "))
            .unwrap_or("I don't know.");
        let source = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Source: "))
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": format!("{}\nSOURCES: {}", content, source) },
                "finish_reason": "stop"
            }]
        }))
    }
}

fn article(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|paragraph| format!("<p>{}</p>", paragraph))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><header>Menu</header><article><h1>{}</h1>{}</article><footer>Copyright</footer></body></html>",
        title, title, body
    )
}

async fn mock_services() -> MockServer {
    let server = MockServer::start().await;

    let pages = [
        (
            "/banking",
            article(
                "Banking",
                &["The central bank raised lending rates to curb inflation.", "Commercial bank stocks fell."],
            ),
        ),
        (
            "/agriculture",
            article(
                "Agriculture",
                &["Maize farmers in the Rift Valley expect a record harvest.", "Fertiliser subsidies helped farmers."],
            ),
        ),
        (
            "/tourism",
            article(
                "Tourism",
                &["Safari operators welcomed more tourists this season.", "Coastal hotels were fully booked."],
            ),
        ),
    ];

    for (route, html) in pages {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(CitingChat)
        .mount(&server)
        .await;

    server
}

fn test_config(temp_dir: &TempDir, server: &MockServer, routes: &[&str]) -> Config {
    let mut config = Config::load(temp_dir.path()).expect("should load default config");
    config.openai.base_url = format!("{}/v1", server.uri());
    config.openai.timeout_seconds = 5;
    config.openai.chat_timeout_seconds = 5;
    config.loader.timeout_seconds = 5;
    config.loader.urls = routes
        .iter()
        .map(|route| format!("{}{}", server.uri(), route))
        .collect();
    config.retrieval.top_k = 1;
    config
}

fn set_api_key() {
    // SAFETY: every test touching the process environment is serialized
    unsafe { std::env::set_var(API_KEY_ENV, "sk-integration") };
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn answers_cite_the_matching_article() {
    set_api_key();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = mock_services().await;
    let config = test_config(&temp_dir, &server, &["/banking", "/agriculture", "/tourism"]);

    let (app, summary) = AppContext::build(&config).await.expect("build should succeed");
    assert_eq!(summary.documents, 3);
    assert_eq!(summary.chunks, 3);
    assert!(summary.failed_urls.is_empty());

    let answer = app
        .answer("What harvest are maize farmers expecting?")
        .await
        .expect("question should be answered");

    let agriculture = format!("{}/agriculture", server.uri());
    assert_eq!(answer.sources, vec![agriculture]);
    assert!(answer.text.contains("record harvest"));
    assert!(!answer.text.contains("Menu"));
    app.close().await;

    // A fresh process serves the same index without rebuilding
    let app = AppContext::open(&config).await.expect("index should reopen");
    let answer = app
        .answer("Are tourists going on safari?")
        .await
        .expect("question should be answered");
    assert_eq!(answer.sources, vec![format!("{}/tourism", server.uri())]);
    app.close().await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn build_fails_when_no_source_loads() {
    set_api_key();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = mock_services().await;
    let config = test_config(&temp_dir, &server, &["/gone", "/also-gone"]);

    let error = AppContext::build(&config)
        .await
        .err()
        .expect("build should fail");

    assert!(matches!(error, QaError::Loader(_)));
    assert!(error.to_string().contains("any of 2 configured URLs"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn stale_index_is_refused() {
    set_api_key();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = mock_services().await;
    let config = test_config(&temp_dir, &server, &["/banking", "/tourism"]);

    let (app, _) = AppContext::build(&config).await.expect("build should succeed");
    app.close().await;

    // Remove a docstore row so the vector index has an orphan
    let index = VectorIndex::open(&config).await.expect("index should open");
    sqlx::query("DELETE FROM chunks WHERE id = (SELECT MIN(id) FROM chunks)")
        .execute(index.database().pool())
        .await
        .expect("should delete chunk");
    index.close().await;

    let error = AppContext::open(&config)
        .await
        .err()
        .expect("inconsistent index should not open");
    assert!(matches!(error, QaError::Index(_)));
    assert!(error.to_string().contains("news-qa build"));
}
