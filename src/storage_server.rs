//! Local storage endpoint speaking the same protocol as the remote storage
//! function: `POST /upload?path=<object>` with raw bytes, answered with
//! `{"url": ...}`. Stored objects are served back under `/media/`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path as UrlPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{PropmediaError, Result};

/// Largest accepted upload body
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub struct StorageServer {
    root: PathBuf,
    public_base_url: String,
    api_key: Option<String>,
    allowed_origins: Vec<String>,
}

#[derive(Clone)]
struct AppState {
    root: Arc<PathBuf>,
    public_base_url: Arc<String>,
    api_key: Option<Arc<String>>,
}

#[derive(Deserialize)]
struct UploadParams {
    path: String,
}

impl StorageServer {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
            api_key: None,
            allowed_origins: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.storage_server.root.clone(),
            public_base_url: config.storage_server.public_base_url.clone(),
            api_key: config.storage_api_key(),
            allowed_origins: config.storage_server.allowed_origins.clone(),
        }
    }

    /// Require `Authorization: Bearer <key>` on uploads
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn router(&self) -> Router {
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state = AppState {
            root: Arc::new(self.root.clone()),
            public_base_url: Arc::new(self.public_base_url.trim_end_matches('/').to_string()),
            api_key: self.api_key.clone().map(Arc::new),
        };

        Router::new()
            .route("/upload", post(handle_upload))
            .route("/media/*path", get(handle_media))
            .route("/health", get(handle_health))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(state)
    }

    /// Bind `127.0.0.1:<port>` and serve until the process ends
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            PropmediaError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Set storage_server.port in config.toml to use another port.",
                    addr, e
                ),
            ))
        })?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        if let Ok(addr) = listener.local_addr() {
            log::info!("Storage endpoint listening on http://{}", addr);
        }
        log::info!("Storing objects under {}", self.root.display());

        axum::serve(listener, self.router()).await.map_err(|e| {
            PropmediaError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })
    }
}

/// Resolve an object path to a location under the storage root.
///
/// Only plain relative segments are accepted; anything that could escape
/// the root (`..`, absolute paths, drive prefixes) is rejected.
pub fn object_location(root: &Path, object_path: &str) -> Result<PathBuf> {
    let trimmed = object_path.trim();
    if trimmed.is_empty() {
        return Err(PropmediaError::InvalidInput("object path is empty".to_string()));
    }
    if trimmed.contains('\\') {
        return Err(PropmediaError::InvalidInput(format!(
            "object path may not contain backslashes: {}",
            object_path
        )));
    }

    let relative = Path::new(trimmed);
    let mut segments = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => segments += 1,
            Component::CurDir => {}
            _ => {
                return Err(PropmediaError::InvalidInput(format!(
                    "object path must stay inside the storage root: {}",
                    object_path
                )))
            }
        }
    }
    if segments == 0 {
        return Err(PropmediaError::InvalidInput(format!(
            "object path names no file: {}",
            object_path
        )));
    }

    Ok(root.join(relative))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match provided {
        Some(key) if key == expected_key => Ok(()),
        Some(_) => Err(error_response(StatusCode::UNAUTHORIZED, "Invalid API key")),
        None => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Use 'Authorization: Bearer <api-key>' header",
        )),
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(key) = &state.api_key {
        if let Err(response) = validate_auth(&headers, key) {
            return response;
        }
    }

    let target = match object_location(&state.root, &params.path) {
        Ok(target) => target,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "upload body is empty");
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            log::error!("Could not create {}: {}", parent.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not store object");
        }
    }
    if let Err(e) = tokio::fs::write(&target, &body).await {
        log::error!("Could not write {}: {}", target.display(), e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not store object");
    }

    let object_path = params.path.trim().trim_start_matches("./");
    let url = format!("{}/{}", state.public_base_url, object_path);
    log::info!("Stored {} ({} bytes)", object_path, body.len());

    (
        StatusCode::OK,
        Json(serde_json::json!({ "url": url, "path": object_path })),
    )
        .into_response()
}

async fn handle_media(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    let target = match object_location(&state.root, &path) {
        Ok(target) => target,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match tokio::fs::read(&target).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&target)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, format!("no object at {}", path))
        }
        Err(e) => {
            log::error!("Could not read {}: {}", target.display(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not read object")
        }
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "propmedia-storage",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}
