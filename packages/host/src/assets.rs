//! Serving frame UI files for the custom schemes.
//!
//! `applet://<identity>/<path>` and `cross-group://<tool>/<path>` resolve
//! against the installed asset directory of the applet or tool. The entry
//! document gets the runtime shim spliced into its `<head>` so that it runs
//! before any applet script.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use framelink_protocol::{FrameKind, OriginSchemes, ViewSubType};
use http::{header, Response, StatusCode};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::error::AssetError;
use crate::services::InstallationStore;

const INDEX: &str = "index.html";

lazy_static! {
    static ref HEAD_TAG: Regex = Regex::new(r"(?i)<head\b[^>]*>").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"(?i)<html\b[^>]*>").unwrap();
    static ref TITLE_ELEMENT: Regex = Regex::new(r"(?is)<title\b[^>]*>.*?</title\s*>").unwrap();
    static ref SCRIPT_CLOSE: Regex = Regex::new(r"(?i)</(script)").unwrap();
}

/// Splice `script` into the document head and drop the first `<title>`.
///
/// Documents without a `<head>` get one, after `<html>` if there is one,
/// otherwise at the very start.
pub fn inject_shim(html: &str, script: &str) -> String {
    let html = TITLE_ELEMENT.replace(html, "");
    let element = format!(
        "<script>{}</script>",
        SCRIPT_CLOSE.replace_all(script, r"<\/$1")
    );

    if let Some(head) = HEAD_TAG.find(&html) {
        let mut out = String::with_capacity(html.len() + element.len());
        out.push_str(&html[..head.end()]);
        out.push_str(&element);
        out.push_str(&html[head.end()..]);
        return out;
    }

    let element = format!("<head>{}</head>", element);
    match HTML_TAG.find(&html) {
        Some(tag) => format!("{}{}{}", &html[..tag.end()], element, &html[tag.end()..]),
        None => format!("{}{}", element, html),
    }
}

/// Guess a `Content-Type` from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// Turn a URL path into a path relative to the asset directory.
fn relative_path(url_path: &str) -> Result<PathBuf, AssetError> {
    let mut relative = PathBuf::new();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(AssetError::PathTraversal(url_path.to_string())),
            s if s.eq_ignore_ascii_case("%2e%2e") => {
                return Err(AssetError::PathTraversal(url_path.to_string()))
            }
            s => relative.push(s),
        }
    }
    // Backslashes or drive prefixes could still sneak out on some platforms.
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(AssetError::PathTraversal(url_path.to_string()));
    }
    Ok(relative)
}

/// Resolves scheme URLs to responses.
#[derive(Clone)]
pub struct AssetResolver {
    installations: Arc<dyn InstallationStore>,
    schemes: OriginSchemes,
    shim_script: Arc<str>,
}

impl AssetResolver {
    pub fn new(
        installations: Arc<dyn InstallationStore>,
        schemes: OriginSchemes,
        shim_script: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            installations,
            schemes,
            shim_script: shim_script.into(),
        }
    }

    /// Resolve one request URL.
    ///
    /// Fails if the URL does not name a frame with installed assets. A
    /// missing `index.html` is a 404 response instead, since the frame
    /// itself exists.
    pub async fn resolve(&self, url: &str) -> Result<Response<Vec<u8>>, AssetError> {
        let parsed = Url::parse(url).map_err(|_| AssetError::InvalidUrl(url.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AssetError::InvalidUrl(url.to_string()))?;
        let origin = format!("{}://{}", parsed.scheme(), host);
        let kind = FrameKind::from_origin(&origin, &self.schemes, ViewSubType::Main)?;

        let dir = self
            .asset_dir(&kind)
            .await
            .ok_or_else(|| AssetError::NoAssetDirectory(origin.clone()))?;
        let relative = relative_path(parsed.path())?;

        if relative.as_os_str().is_empty() || relative == Path::new(INDEX) {
            return self.index(&dir, &origin).await;
        }

        let file = dir.join(&relative);
        match tokio::fs::metadata(&file).await {
            Ok(metadata) if metadata.is_file() => {
                let body = tokio::fs::read(&file).await?;
                debug!(origin = %origin, path = %relative.display(), "serving asset");
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, content_type(&file))
                    .body(body)?)
            }
            Ok(_) => self.index(&dir, &origin).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(origin = %origin, path = %relative.display(), "unknown path, serving index");
                self.index(&dir, &origin).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn asset_dir(&self, kind: &FrameKind) -> Option<PathBuf> {
        match kind {
            FrameKind::Applet { applet_hash, .. } => {
                self.installations.ui_asset_dir(applet_hash).await
            }
            FrameKind::CrossGroup {
                tool_compatibility_id,
                ..
            } => {
                self.installations
                    .tool_asset_dir(tool_compatibility_id)
                    .await
            }
            FrameKind::Dev { .. } => None,
        }
    }

    async fn index(&self, dir: &Path, origin: &str) -> Result<Response<Vec<u8>>, AssetError> {
        let path = dir.join(INDEX);
        let html = match tokio::fs::read_to_string(&path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(origin, "no index.html in asset directory {}", dir.display());
                let body = format!(
                    "No index.html found for {}. The UI assets of this frame are incomplete.",
                    origin
                );
                return Ok(Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(body.into_bytes())?);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(&path))
            .body(inject_shim(&html, &self.shim_script).into_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_into_existing_head() {
        let html = "<!doctype html><html><head lang=\"en\"><title>Mine</title><script src=\"app.js\"></script></head><body></body></html>";
        let out = inject_shim(html, "boot()");
        assert_eq!(
            out,
            "<!doctype html><html><head lang=\"en\"><script>boot()</script><script src=\"app.js\"></script></head><body></body></html>"
        );
    }

    #[test]
    fn creates_head_when_missing() {
        assert_eq!(
            inject_shim("<html><body>x</body></html>", "s"),
            "<html><head><script>s</script></head><body>x</body></html>"
        );
        assert_eq!(inject_shim("<p>x</p>", "s"), "<head><script>s</script></head><p>x</p>");
    }

    #[test]
    fn header_is_not_head() {
        let out = inject_shim("<header>h</header>", "s");
        assert!(out.starts_with("<head><script>s</script></head><header>"));
    }

    #[test]
    fn only_first_title_is_removed() {
        let out = inject_shim("<head><TITLE>a\nb</TITLE></head><svg><title>c</title></svg>", "");
        assert_eq!(out, "<head><script></script></head><svg><title>c</title></svg>");
    }

    #[test]
    fn script_cannot_close_its_element() {
        let out = inject_shim("<head></head>", "x = '</SCRIPT>'");
        assert!(out.contains(r"x = '<\/SCRIPT>'"));
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_path("/").unwrap(), PathBuf::new());
        assert_eq!(relative_path("/a/./b.js").unwrap(), PathBuf::from("a/b.js"));
        assert!(matches!(
            relative_path("/a/../../etc/passwd"),
            Err(AssetError::PathTraversal(_))
        ));
        assert!(relative_path("/%2E%2e/x").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/app.JS")), "text/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
