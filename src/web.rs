use crate::loader::{BookOption, CONTENT_PATH, LoadError, Viewer};
use crate::render::{BOOK_SELECTOR_ID, CHAPTER_CONTAINER_ID};
use askama::Template;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use include_dir::{Dir, include_dir};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;

static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

const RENDER_PATH: &str = "/render";
const SERVICE_NAME: &str = "tischendorf-viewer";
const PAGE_TITLE: &str = "Tischendorf Greek New Testament";

pub struct AppState {
    pub viewer: Viewer,
    pub corpus_json: Bytes,
    pub base_url: String,
}

impl AppState {
    /// Encodes the corpus once; every `/load_content` response reuses the bytes.
    pub fn new(viewer: Viewer, base_url: impl Into<String>) -> Result<Self, WebError> {
        let corpus_json = Bytes::from(viewer.corpus().to_json_vec()?);
        Ok(Self {
            viewer,
            corpus_json,
            base_url: base_url.into(),
        })
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Load(LoadError),
    Encode(serde_json::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Load(err) => write!(f, "failed to load corpus: {err}"),
            WebError::Encode(err) => write!(f, "failed to encode corpus: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<LoadError> for WebError {
    fn from(value: LoadError) -> Self {
        WebError::Load(value)
    }
}

impl From<serde_json::Error> for WebError {
    fn from(value: serde_json::Error) -> Self {
        WebError::Encode(value)
    }
}

pub async fn serve(config: WebConfig, viewer: Viewer) -> Result<(), WebError> {
    let books = viewer.options().len();
    let state = Arc::new(AppState::new(viewer, config.base_url.clone())?);
    let router = build_router(state);
    info!(
        %config.addr,
        books,
        base = %config.base_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route(CONTENT_PATH, get(load_content))
        .route(RENDER_PATH, get(render_fragment))
        .route("/static/*path", get(static_asset))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Default, Deserialize)]
struct BookParams {
    book: Option<String>,
}

impl BookParams {
    fn key(&self) -> &str {
        self.book.as_deref().map(str::trim).unwrap_or_default()
    }
}

async fn home(
    State(state): State<SharedState>,
    Query(params): Query<BookParams>,
) -> impl IntoResponse {
    let selected = params.key();
    let rendered = state.viewer.select(selected);
    let chapters_html = match rendered.to_html() {
        Ok(html) => html,
        Err(err) => return Html(render_error_page(err.to_string())),
    };
    // Only the deep-linked book is listed up front; the page script fills in the rest.
    let options: Vec<&BookOption> = state
        .viewer
        .options()
        .iter()
        .filter(|option| rendered.book_key() == Some(option.value.as_str()))
        .collect();
    let canonical_url = match rendered.book_key() {
        Some(key) => format!("{}/?book={}", state.base_url, encode_component(key)),
        None => format!("{}/", state.base_url),
    };
    let template = IndexTemplate {
        title: PAGE_TITLE,
        version: env!("CARGO_PKG_VERSION"),
        canonical_url,
        selector_id: BOOK_SELECTOR_ID,
        container_id: CHAPTER_CONTAINER_ID,
        content_url: CONTENT_PATH,
        render_url: RENDER_PATH,
        options,
        selected,
        chapters_html,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

async fn load_content(State(state): State<SharedState>) -> Response {
    (
        [(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())],
        state.corpus_json.clone(),
    )
        .into_response()
}

async fn render_fragment(
    State(state): State<SharedState>,
    Query(params): Query<BookParams>,
) -> Result<Html<String>, ApiError> {
    let rendered = state.viewer.select(params.key());
    rendered.to_html().map(Html).map_err(|err| {
        error!(book = params.key(), %err, "Failed to render book");
        ApiError::internal("failed to render book")
    })
}

async fn static_asset(Path(path): Path<String>) -> Result<Response, ApiError> {
    let file = ASSETS
        .get_file(&path)
        .ok_or_else(|| ApiError::not_found(format!("No asset named {path:?}")))?;
    let content_type = asset_mime(&path);
    Ok((
        [(header::CONTENT_TYPE, content_type.as_ref())],
        file.contents(),
    )
        .into_response())
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "books": state.viewer.options().len(),
    }))
}

fn asset_mime(path: &str) -> mime::Mime {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("html") => mime::TEXT_HTML_UTF_8,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn render_error_page(message: impl Into<String>) -> String {
    let message = crate::render::escape_html(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title} • Error</title>
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
  </head>
  <body class="bg-light text-dark">
    <main class="container py-5">
      <div class="mx-auto col-lg-10">
        <h1 class="display-5 fw-bold">Something went wrong</h1>
        <p class="lead mb-4">{message}</p>
        <a href="/" class="btn btn-primary btn-lg px-4 py-2">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
        title = PAGE_TITLE,
        message = message,
    )
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }}</title>
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>
    <link rel="canonical" href="{{ canonical_url|safe }}">
  </head>
  <body class="bg-light text-dark">
    <main class="container py-5">
      <div class="mx-auto col-lg-10">
        <p class="text-uppercase text-muted mb-2">Tischendorf Viewer v{{ version }}</p>
        <h1 class="display-5 fw-bold mb-4">{{ title }}</h1>
        <label for="{{ selector_id }}" class="form-label">Book</label>
        <select id="{{ selector_id }}" class="form-select mb-4" data-content-url="{{ content_url|safe }}" data-render-url="{{ render_url|safe }}">
          <option value="">Select a book</option>
          {% for option in options %}
          <option value="{{ option.value }}"{% if option.value == selected %} selected{% endif %}>{{ option.label }}</option>
          {% endfor %}
        </select>
        <div class="accordion" id="{{ container_id }}">{{ chapters_html|safe }}</div>
        <div id="detailsBox" class="card card-body mt-4 d-none" aria-live="polite"></div>
      </div>
    </main>
    <script src="/static/viewer.js"></script>
  </body>
</html>"#,
    ext = "html"
)]
struct IndexTemplate<'a> {
    title: &'a str,
    version: &'a str,
    canonical_url: String,
    selector_id: &'a str,
    container_id: &'a str,
    content_url: &'a str,
    render_url: &'a str,
    options: Vec<&'a BookOption>,
    selected: &'a str,
    chapters_html: String,
}
