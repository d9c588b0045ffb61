use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Extension, Multipart, Request, State};
use axum::http::header::{HeaderValue, CONTENT_SECURITY_POLICY};
use axum::middleware::{self, Next};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;
use tracing::{info, warn};

use crate::boards::BoardDirectory;
use crate::convert::{self, DocumentKind};
use crate::error::{ConvertError, PublishError, TrelloError};
use crate::parser::{self, extract::FieldExtractor, extract::TagConvention};
use crate::trello::{BoardApi, Publisher, TrelloClient};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Hash of the indicator stylesheet htmx injects at load time.
const HTMX_CSS_HASH: &str = "sha256-pgn1TCGZX6O77zDvy0oTODMOxemn0oj0LeCnQTRj7Kg=";

/// Per-request CSP nonces, handed to page handlers as an `Extension`.
#[derive(Debug, Clone)]
struct Nonces {
    script: String,
    style: String,
}

impl Nonces {
    fn generate() -> Self {
        Nonces {
            script: random_nonce(),
            style: random_nonce(),
        }
    }

    fn policy(&self) -> String {
        format!(
            "default-src 'self'; script-src 'nonce-{}'; \
             style-src 'nonce-{}' '{}' https://cdnjs.cloudflare.com; \
             font-src 'self' https://cdnjs.cloudflare.com",
            self.script, self.style, HTMX_CSS_HASH
        )
    }
}

fn random_nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    boards: BoardDirectory,
    convention: TagConvention,
    /// `None` when credentials are missing; uploads then fail with a clear message.
    trello: Option<TrelloClient>,
}

impl AppState {
    pub fn new(boards: BoardDirectory, convention: TagConvention, trello: Option<TrelloClient>) -> Self {
        AppState {
            inner: Arc::new(Inner {
                boards,
                convention,
                trello,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Nenhum arquivo enviado")]
    MissingFile,
    #[error("Formato de arquivo inválido")]
    InvalidFormat,
    #[error("upload failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("could not store upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("conversion task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Trello(#[from] TrelloError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/upload", post(upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down server");
}

// ── Middleware ──

async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = next.run(req).await;

    info!(
        status = resp.status().as_u16(),
        %method,
        %path,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request"
    );
    resp
}

async fn security_headers(mut req: Request, next: Next) -> Response {
    let nonces = Nonces::generate();
    let policy = nonces.policy();
    req.extensions_mut().insert(nonces);

    let mut resp = next.run(req).await;
    match HeaderValue::from_str(&policy) {
        Ok(value) => {
            resp.headers_mut().insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => warn!(error = %e, "Invalid content security policy"),
    }
    resp
}

// ── Handlers ──

async fn home(Extension(nonces): Extension<Nonces>) -> Html<String> {
    Html(pages::home(&nonces))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn upload(State(state): State<AppState>, multipart: Multipart) -> Html<String> {
    let inner = &state.inner;
    let result = match read_upload(multipart).await {
        Ok((file_name, bytes)) => match &inner.trello {
            Some(client) => {
                process_upload(client, &inner.boards, inner.convention, &file_name, bytes).await
            }
            None => Err(TrelloError::MissingCredentials.into()),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(created) => Html(pages::upload_success(created)),
        Err(e) => {
            warn!(error = %e, "Upload failed");
            Html(pages::upload_error(&e.to_string()))
        }
    }
}

/// First multipart field named `file`, with its client-side file name.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(UploadError::MissingFile)
}

/// Convert, parse and publish one uploaded report. Returns the number of cards created.
pub async fn process_upload<A: BoardApi + Sync>(
    api: &A,
    boards: &BoardDirectory,
    convention: TagConvention,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<usize, UploadError> {
    if file_name.is_empty() {
        return Err(UploadError::MissingFile);
    }
    let kind = DocumentKind::from_path(Path::new(file_name)).map_err(|_| UploadError::InvalidFormat)?;
    if !kind.is_word() {
        return Err(UploadError::InvalidFormat);
    }

    // Converters work from disk; the temp file keeps the original extension.
    let suffix = format!(".{}", file_name.rsplit('.').next().unwrap_or_default());
    let mut file = tempfile::Builder::new().suffix(&suffix).tempfile()?;
    file.write_all(&bytes)?;
    let path = file.into_temp_path();

    let body = {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || convert::convert_path(&path)).await??
    };
    drop(path);

    let extractor = FieldExtractor::new(boards, convention);
    let cards = parser::parse_document(&body, &extractor);
    info!(file = file_name, cards = cards.len(), "Parsed upload");

    let created = Publisher::new(api, boards)
        .publish_all(&cards, |_, _| {})
        .await?;
    Ok(created)
}

mod pages {
    use super::Nonces;

    pub fn home(nonces: &Nonces) -> String {
        layout(
            nonces,
            r##"<h1>Publicações</h1>
<form hx-post="/upload" hx-encoding="multipart/form-data" hx-target="#result">
  <input type="file" name="file" accept=".doc,.docx" required>
  <button type="submit">Enviar</button>
</form>
<div id="result"></div>"##,
        )
    }

    pub fn upload_success(created: usize) -> String {
        format!(
            r#"<div class="success">Arquivo processado: {} cartões criados.</div>"#,
            created
        )
    }

    pub fn upload_error(message: &str) -> String {
        format!(
            r#"<div class="error">Erro ao processar arquivo: {}</div>"#,
            escape(message)
        )
    }

    fn layout(nonces: &Nonces, body: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>Publicações</title>
<script nonce="{script}" src="https://unpkg.com/htmx.org@1.9.12"></script>
<style nonce="{style}">
.success {{ color: green; }}
.error {{ color: darkred; }}
</style>
</head>
<body>
{body}
</body>
</html>"#,
            script = nonces.script,
            style = nonces.style,
            body = body
        )
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

}

// ── Tests ──
