//! Best-effort link previews (OpenGraph metadata).
//!
//! Given a post body, the first URL is extracted and fetched; the page's
//! `og:title` / `og:image` (falling back to `<title>`) become the preview.
//! Every failure mode -- timeout, non-success status, unparseable page --
//! degrades to "no preview".  Nothing in this module ever surfaces an error
//! to its caller.

use axum::extract::{Query, State};
use axum::Json;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ApiError;

/// A link preview.  All fields optional; an all-`None` value means "no
/// preview".
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OgPreview {
    pub url: Option<String>,
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Find the first `http(s)://` URL in free text.  The URL ends at whitespace
/// or a closing delimiter, mirroring how URLs appear in markdown prose.
pub fn extract_first_url(text: &str) -> Option<&str> {
    let start = match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, ')' | ']' | '}' | '>' | '\'' | '"'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Fetch the preview for `url`.  Best-effort: any failure yields a preview
/// that carries only the original URL.
pub async fn fetch_og(client: &Client, url: &str) -> OgPreview {
    match try_fetch(client, url).await {
        Ok(preview) => preview,
        Err(e) => {
            tracing::debug!(url, error = %e, "link preview fetch failed");
            OgPreview {
                url: Some(url.to_string()),
                ..Default::default()
            }
        }
    }
}

async fn try_fetch(client: &Client, url: &str) -> Result<OgPreview, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    let final_url = response.url().clone();
    let html = response.text().await?;

    let title = find_meta_content(&html, "og:title").or_else(|| find_title(&html));
    let image = find_meta_content(&html, "og:image")
        .map(|image| resolve_image_url(&final_url, &image));

    Ok(OgPreview {
        url: Some(final_url.to_string()),
        title,
        image,
    })
}

/// Resolve a possibly-relative image reference against the page URL.
fn resolve_image_url(base: &reqwest::Url, image: &str) -> String {
    base.join(image)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| image.to_string())
}

/// The `content` attribute of the first `<meta>` tag carrying the given
/// `property`.  Tag syntax is matched case-insensitively; attribute values
/// are returned verbatim.
fn find_meta_content(html: &str, property: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let double = format!("property=\"{property}\"");
    let single = format!("property='{property}'");

    let mut from = 0;
    while let Some(offset) = lower[from..].find("<meta") {
        let start = from + offset;
        let Some(end) = lower[start..].find('>').map(|i| start + i) else {
            return None;
        };
        let tag_lower = &lower[start..end];
        if tag_lower.contains(&double) || tag_lower.contains(&single) {
            return extract_attr(&html[start..end], tag_lower, "content");
        }
        from = end;
    }
    None
}

fn extract_attr(tag: &str, tag_lower: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let needle = format!("{attr}={quote}");
        if let Some(pos) = tag_lower.find(&needle) {
            let rest = &tag[pos + needle.len()..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

/// Text of the `<title>` element, as the fallback when `og:title` is absent.
fn find_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title")?;
    let open_end = start + lower[start..].find('>')? + 1;
    let close = open_end + lower[open_end..].find("</title")?;
    let title = html[open_end..close].trim();
    (!title.is_empty()).then(|| title.to_string())
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OgPreviewQuery {
    pub url: String,
}

/// GET /utils/og-preview
pub async fn og_preview(
    State(state): State<AppState>,
    Query(query): Query<OgPreviewQuery>,
) -> Result<Json<OgPreview>, ApiError> {
    if query.url.len() < 8 {
        return Err(ApiError::BadRequest("url is too short".into()));
    }
    Ok(Json(fetch_og(&state.http, &query.url).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_url_extraction() {
        assert_eq!(
            extract_first_url("see https://example.com/a?b=1 and more"),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(
            extract_first_url("(http://a.example)"),
            Some("http://a.example")
        );
        assert_eq!(
            extract_first_url("docs: https://docs.rs/axum\nnext line"),
            Some("https://docs.rs/axum")
        );
        assert_eq!(extract_first_url("no links here"), None);
    }

    #[test]
    fn meta_content_extraction() {
        let html = r#"<html><head>
            <META property="og:title" content="The Title">
            <meta property='og:image' content='/img/cover.png'>
            <title>Fallback</title>
        </head></html>"#;

        assert_eq!(
            find_meta_content(html, "og:title").as_deref(),
            Some("The Title")
        );
        assert_eq!(
            find_meta_content(html, "og:image").as_deref(),
            Some("/img/cover.png")
        );
        assert_eq!(find_meta_content(html, "og:video"), None);
    }

    #[test]
    fn title_fallback() {
        let html = "<html><head><title> Plain Title </title></head></html>";
        assert_eq!(find_title(html).as_deref(), Some("Plain Title"));
        assert_eq!(find_title("<html></html>"), None);
    }

    #[test]
    fn relative_images_resolve_against_the_page() {
        let base: reqwest::Url = "https://example.com/articles/1".parse().unwrap();
        assert_eq!(
            resolve_image_url(&base, "/img/cover.png"),
            "https://example.com/img/cover.png"
        );
        assert_eq!(
            resolve_image_url(&base, "https://cdn.example.com/x.png"),
            "https://cdn.example.com/x.png"
        );
    }
}
