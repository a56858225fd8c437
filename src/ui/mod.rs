// Single-page web form over an `Answerer`

#[cfg(test)]
mod tests;

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Router};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::app::Answerer;
use crate::chain::Answer;
use crate::config::UiConfig;
use crate::{QaError, Result};

const QUERY_LABEL: &str = "Enter your search query related to Kenyan business:";

const HOW_IT_WORKS: [&str; 3] = [
    "Enter a query related to Kenyan business news.",
    "The model will search the content of multiple Kenyan business websites.",
    "The results will include relevant answers and sources.",
];

/// What the page shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Displaying { query: String, answer: Answer },
    Error { query: String, message: String },
}

impl SearchState {
    /// Run one search. Blank queries leave the page idle without calling the answerer.
    #[inline]
    pub async fn submit(answerer: &dyn Answerer, query: &str) -> Self {
        let query = query.trim();
        if query.is_empty() {
            return Self::Idle;
        }

        match answerer.answer(query).await {
            Ok(answer) => Self::Displaying {
                query: query.to_string(),
                answer,
            },
            Err(e) => {
                error!("Search failed: {}", e);
                Self::Error {
                    query: query.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Idle | Self::Displaying { .. } => StatusCode::OK,
        }
    }
}

#[derive(Clone)]
struct UiState {
    answerer: Arc<dyn Answerer>,
    title: Arc<str>,
    // One search in flight at a time
    search_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    query: String,
}

#[inline]
pub fn router(answerer: Arc<dyn Answerer>, title: &str) -> Router {
    let state = UiState {
        answerer,
        title: Arc::from(title),
        search_lock: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/search", post(search_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve the web form until the process is interrupted
#[inline]
pub async fn serve(answerer: Arc<dyn Answerer>, config: &UiConfig) -> Result<()> {
    let addr = config
        .bind_addr()
        .map_err(|e| QaError::Config(e.to_string()))?;
    let app = router(answerer, &config.title);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web UI listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down web UI");
        })
        .await?;

    Ok(())
}

async fn index_handler(State(state): State<UiState>) -> Html<String> {
    Html(render_page(&state.title, &SearchState::Idle))
}

async fn search_handler(
    State(state): State<UiState>,
    Form(form): Form<SearchForm>,
) -> (StatusCode, Html<String>) {
    let search_state = {
        let _guard = state.search_lock.lock().await;
        SearchState::submit(state.answerer.as_ref(), &form.query).await
    };

    (
        search_state.status_code(),
        Html(render_page(&state.title, &search_state)),
    )
}

async fn healthz() -> &'static str {
    "ok"
}

/// Render the full page for `state`; all dynamic text is escaped
#[inline]
pub fn render_page(title: &str, state: &SearchState) -> String {
    let title = encode_text(title);
    let query_value = match state {
        SearchState::Idle => "",
        SearchState::Displaying { query, .. } | SearchState::Error { query, .. } => query,
    };

    let mut page = String::new();
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<main>\n<h1>{title}</h1>\n\
         <form method=\"post\" action=\"/search\">\n\
         <label for=\"query\">{label}</label>\n\
         <input type=\"text\" id=\"query\" name=\"query\" value=\"{value}\">\n\
         <button type=\"submit\">Search</button>\n</form>\n",
        title = title,
        label = encode_text(QUERY_LABEL),
        value = encode_double_quoted_attribute(query_value),
    );

    match state {
        SearchState::Idle => {}
        SearchState::Displaying { query, answer } => {
            let _ = writeln!(page, "<p>Your question: {}</p>", encode_text(query));
            let _ = writeln!(page, "<h2>Answer</h2>\n<p>{}</p>", encode_text(&answer.text));
            page.push_str("<h2>Sources</h2>\n");
            if answer.sources.is_empty() {
                page.push_str("<p>No sources.</p>\n");
            } else {
                page.push_str("<ul>\n");
                for source in &answer.sources {
                    let _ = writeln!(
                        page,
                        "<li><a href=\"{}\">{}</a></li>",
                        encode_double_quoted_attribute(source),
                        encode_text(source)
                    );
                }
                page.push_str("</ul>\n");
            }
        }
        SearchState::Error { query, message } => {
            let _ = writeln!(page, "<p>Your question: {}</p>", encode_text(query));
            let _ = writeln!(
                page,
                "<h2>Error</h2>\n<p class=\"error\">{}</p>",
                encode_text(message)
            );
        }
    }

    page.push_str("</main>\n<aside>\n<h2>How it works</h2>\n<ol>\n");
    for step in HOW_IT_WORKS {
        let _ = writeln!(page, "<li>{}</li>", step);
    }
    page.push_str("</ol>\n</aside>\n</body>\n</html>\n");
    page
}
