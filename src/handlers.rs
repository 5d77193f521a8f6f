use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::{Path as RequestPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tokio::fs;
use tracing::{debug, warn};
use url::Url;

use crate::AppState;
use crate::error::FileServerError;

/// GET / - serve the root directory listing
pub async fn serve_root(State(state): State<AppState>) -> Result<Response, FileServerError> {
    respond(&state, String::new()).await
}

/// GET /{*path} - serve a file or directory under the root
pub async fn serve_path(
    State(state): State<AppState>,
    RequestPath(path): RequestPath<String>,
) -> Result<Response, FileServerError> {
    respond(&state, path).await
}

/// Resolve the request path against the root, classify the target and
/// produce the matching response: redirect, file stream, listing, or error.
async fn respond(state: &AppState, request_path: String) -> Result<Response, FileServerError> {
    let full_path = resolve_path(&state.root_dir, &request_path)?;

    let metadata = match fs::metadata(&full_path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileServerError::NotFound(request_path));
        }
        Err(err) => return Err(FileServerError::Io(err)),
    };

    if metadata.is_file() {
        if let Some(proxy_base) = &state.proxy_base {
            return redirect_to_proxy(proxy_base, &request_path);
        }
        return stream_file(state, &full_path, metadata.len()).await;
    }

    if metadata.is_dir() {
        return render_listing(&full_path, &request_path).await;
    }

    // Exists but is neither a regular file nor a directory (FIFO, socket,
    // device node).
    Err(FileServerError::Unsupported(request_path))
}

/// Build the filesystem path for a request path, component by component.
///
/// Parent-directory references, absolute components and embedded null
/// bytes are rejected, and an existing target is canonicalized and checked
/// to still live under the root. All rejections surface as NotFound so a
/// probe cannot distinguish "blocked" from "absent".
fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, FileServerError> {
    let relative = relative.trim_start_matches('/');

    if relative.is_empty() || relative == "." {
        return Ok(root.to_path_buf());
    }

    let mut result = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    warn!("Path component contains null byte: {:?}", name);
                    return Err(FileServerError::NotFound(relative.to_string()));
                }
                result.push(name);
            }
            Component::CurDir => continue,
            Component::ParentDir => {
                warn!("Path traversal attempt: parent directory (..) in request path");
                return Err(FileServerError::NotFound(relative.to_string()));
            }
            Component::RootDir | Component::Prefix(_) => {
                warn!("Absolute component in request path");
                return Err(FileServerError::NotFound(relative.to_string()));
            }
        }
    }

    // An existing target may still escape through a symlink; canonicalize
    // and verify containment.
    if result.exists() {
        let canonical_root = root.canonicalize()?;
        let canonical = result.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            warn!(
                "Symlink escape attempt: {:?} resolves outside root",
                result
            );
            return Err(FileServerError::NotFound(relative.to_string()));
        }
        return Ok(canonical);
    }

    Ok(result)
}

/// Redirect a file request to the configured upstream instead of serving
/// bytes from local disk. No file I/O happens on this path.
fn redirect_to_proxy(proxy_base: &Url, request_path: &str) -> Result<Response, FileServerError> {
    let target = proxy_base
        .join(request_path)
        .map_err(|_| FileServerError::InvalidProxyTarget)?;

    debug!("Redirecting {} to {}", request_path, target);

    Ok((StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response())
}

/// Stream a file in fixed-size chunks read on the worker pool.
///
/// Content length comes from the metadata stat, never from buffering the
/// file. A client disconnect drops the body stream mid-way, which closes
/// the file handle and ends the request silently.
async fn stream_file(
    state: &AppState,
    path: &Path,
    size: u64,
) -> Result<Response, FileServerError> {
    debug!("Streaming file: {} ({} bytes)", path.display(), size);

    let file = fs::File::open(path).await?.into_std().await;
    let body = Body::from_stream(state.read_pool.stream_file(file));

    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        body,
    )
        .into_response())
}

struct ListingEntry {
    name: String,
    is_dir: bool,
}

/// Render a one-level HTML listing of a directory.
async fn render_listing(path: &Path, request_path: &str) -> Result<Response, FileServerError> {
    debug!("Listing directory: {}", path.display());

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(path).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().await?.is_dir();
        entries.push(ListingEntry { name, is_dir });
    }

    // Directories first, then case-insensitive by name, so listings are
    // stable across platforms and filesystems.
    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    Ok(Html(render_listing_html(request_path, &entries)).into_response())
}

fn render_listing_html(request_path: &str, entries: &[ListingEntry]) -> String {
    let here = format!("/{}", request_path.trim_matches('/'));
    let heading = escape_html(&here);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>Index of {heading}</title>\n"));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>Index of {heading}</h1>\n<ul>\n"));

    // The parent link must be absolute: a relative "../" resolves against
    // the request URL, which skips a level when the URL lacks a trailing
    // slash (e.g. from /p/sub it lands on / instead of /p/).
    if !request_path.trim_matches('/').is_empty() {
        let parent = parent_href(request_path);
        html.push_str(&format!("<li><a href=\"{parent}\">../</a></li>\n"));
    }

    for entry in entries {
        let mut href = join_href(request_path, &entry.name);
        let mut label = escape_html(&entry.name);
        if entry.is_dir {
            href.push('/');
            label.push('/');
        }
        html.push_str(&format!("<li><a href=\"{href}\">{label}</a></li>\n"));
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Join the current request path and an entry name into an absolute href,
/// percent-encoding each segment.
fn join_href(request_path: &str, name: &str) -> String {
    let mut href = String::from("/");
    for segment in request_path.split('/').filter(|s| !s.is_empty()) {
        href.push_str(&urlencoding::encode(segment));
        href.push('/');
    }
    href.push_str(&urlencoding::encode(name));
    href
}

/// Absolute href of the parent directory: the request path minus its last
/// segment, percent-encoded like the entry hrefs, with a trailing slash.
fn parent_href(request_path: &str) -> String {
    let segments: Vec<&str> = request_path.split('/').filter(|s| !s.is_empty()).collect();
    let mut href = String::from("/");
    for segment in &segments[..segments.len().saturating_sub(1)] {
        href.push_str(&urlencoding::encode(segment));
        href.push('/');
    }
    href
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
