use super::validate_url as validate_url_impl;
use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><nav>Home</nav><main><p>{}</p></main></body></html>",
        title, body
    )
}

fn config_for(urls: Vec<String>) -> LoaderConfig {
    LoaderConfig {
        urls,
        timeout_seconds: 5,
        ..LoaderConfig::default()
    }
}

#[test]
fn validate_url() {
    assert!(validate_url_impl("https://nation.africa/kenya/business").is_ok());
    assert!(validate_url_impl("http://localhost:8080/").is_ok());

    assert!(validate_url_impl("ftp://example.com").is_err());
    assert!(validate_url_impl("not-a-url").is_err());
    assert!(validate_url_impl("").is_err());
}

#[test]
fn retryable_errors() {
    assert!(is_retryable_error(&anyhow!("HTTP error 503")));
    assert!(is_retryable_error(&anyhow!("HTTP error 429")));
    assert!(is_retryable_error(&anyhow!("Connection refused")));
    assert!(!is_retryable_error(&anyhow!("HTTP error 404")));
    assert!(!is_retryable_error(&anyhow!("Page contained no extractable text")));
}

#[test]
fn empty_report_is_a_loader_error() {
    let report = LoadReport {
        documents: Vec::new(),
        failed: vec![
            LoadFailure {
                url: "https://a.example".to_string(),
                reason: "HTTP error 500".to_string(),
            },
            LoadFailure {
                url: "https://b.example".to_string(),
                reason: "HTTP error 404".to_string(),
            },
        ],
        duration: Duration::default(),
    };

    let error = report.into_documents().expect_err("no documents should fail");
    assert!(matches!(error, QaError::Loader(_)));
    assert_eq!(
        error.to_string(),
        "Loader error: no documents could be loaded from any of 2 configured URLs"
    );
}

#[tokio::test]
async fn loads_pages_and_skips_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page("Markets", "Stocks closed higher on Friday.")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/energy"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page("Energy", "Fuel prices drop.")),
        )
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/markets", server.uri()),
        format!("{}/broken", server.uri()),
        format!("{}/empty", server.uri()),
        format!("{}/energy", server.uri()),
    ];
    let mut loader = DocumentLoader::new(&config_for(urls.clone()));

    let report = loader.load().await;

    assert_eq!(report.attempted(), 4);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].url, urls[1]);
    assert!(report.failed[0].reason.contains("500"));
    assert_eq!(report.failed[1].url, urls[2]);

    let documents = report.into_documents().expect("documents should load");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].source_url, urls[0]);
    assert_eq!(documents[0].title.as_deref(), Some("Markets"));
    assert_eq!(documents[0].text, "Stocks closed higher on Friday.");
    assert_eq!(documents[1].source_url, urls[3]);
}

#[tokio::test]
async fn retries_server_errors_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("Flaky", "Recovered.")))
        .mount(&server)
        .await;

    let config = LoaderConfig {
        max_retries: 1,
        ..config_for(vec![format!("{}/flaky", server.uri())])
    };
    let client = HttpClient::new(config.clone()).with_retry_delay(Duration::from_millis(1));
    let mut loader = DocumentLoader::new(&config).with_client(client);

    let documents = loader
        .load()
        .await
        .into_documents()
        .expect("retry should recover");
    assert_eq!(documents[0].text, "Recovered.");
}

#[tokio::test]
async fn all_urls_failing_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/a", server.uri()),
        format!("{}/b", server.uri()),
        "not a url".to_string(),
    ];
    let mut loader = DocumentLoader::new(&config_for(urls));

    let report = loader.load().await;
    assert!(report.documents.is_empty());
    assert_eq!(report.failed.len(), 3);
    assert!(matches!(report.into_documents(), Err(QaError::Loader(_))));
}
