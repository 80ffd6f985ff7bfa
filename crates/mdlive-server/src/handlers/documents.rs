//! Document serving.
//!
//! Every path outside `/refresh/` maps onto the root directory:
//! directories get an index page, markdown files are rendered to HTML,
//! and anything else is served as a static file.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use md5::{Digest, Md5};
use mdlive_renderer::{ListingEntry, render_directory_listing};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::ServerError;
use crate::state::AppState;

/// Handle any document request.
pub(crate) async fn serve_document(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Response, ServerError> {
    let url_path = decode_url_path(request.uri().path())?;
    let fs_path = resolve_path(&state.root_dir, &url_path)?;
    let metadata = tokio::fs::metadata(&fs_path)
        .await
        .map_err(|e| ServerError::from_fs(e, &url_path))?;

    if metadata.is_dir() {
        directory_page(&state, &url_path, &fs_path).await
    } else if is_markdown(&fs_path) {
        markdown_page(&state, &url_path, &fs_path, request.headers()).await
    } else {
        Ok(serve_file(&fs_path, request).await)
    }
}

/// Render the index page of a directory.
async fn directory_page(
    state: &AppState,
    url_path: &str,
    dir: &Path,
) -> Result<Response, ServerError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ServerError::from_fs(e, url_path))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        entries.push(ListingEntry::new(
            entry.file_name().to_string_lossy(),
            is_dir,
        ));
    }

    let frame = state.templates.load().await?;
    let page = frame.wrap(&render_directory_listing(url_path, &entries));
    Ok(Html(page).into_response())
}

/// Render a markdown file inside the page templates.
async fn markdown_page(
    state: &AppState,
    url_path: &str,
    file: &Path,
    headers: &HeaderMap,
) -> Result<Response, ServerError> {
    let markdown = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| ServerError::from_fs(e, url_path))?;

    let frame = state.templates.load().await?;
    let html = frame.wrap(&state.renderer.render(&markdown));
    let etag = page_etag(&state.version, &html);

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && if_none_match.as_bytes() == etag.as_bytes()
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    Ok((
        [
            (header::ETAG, etag),
            (header::CACHE_CONTROL, "no-cache".to_owned()),
        ],
        Html(html),
    )
        .into_response())
}

/// Serve a file as-is, with content type, range and conditional handling.
async fn serve_file(path: &Path, request: Request<Body>) -> Response {
    let Ok(response) = ServeFile::new(path).oneshot(request).await;
    response.into_response()
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Percent-decode a request path.
fn decode_url_path(raw: &str) -> Result<String, ServerError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| ServerError::InvalidPath(raw.to_owned()))
}

/// Map a decoded URL path onto the root directory.
///
/// Rejects any path that could leave the root.
fn resolve_path(root: &Path, url_path: &str) -> Result<PathBuf, ServerError> {
    let mut resolved = root.to_path_buf();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ServerError::InvalidPath(url_path.to_owned())),
            s if s.contains(['\\', '\0']) => {
                return Err(ServerError::InvalidPath(url_path.to_owned()));
            }
            s => resolved.push(s),
        }
    }
    Ok(resolved)
}

/// Strong `ETag` of a rendered page: the first 8 bytes of MD5 over the
/// server version and the complete page, templates included.
fn page_etag(version: &str, page: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(version.as_bytes());
    hasher.update([0u8]);
    hasher.update(page.as_bytes());
    let digest = hasher.finalize();
    format!("\"{}\"", hex::encode(&digest[..8]))
}
