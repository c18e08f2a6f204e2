//! Presentation source detection and URL rewriting.
//!
//! `direct_url` and `viewer_url` are pure functions of the stored URL and its
//! source type; they are recomputed whenever a presentation is read or
//! imported and are never the stored source of truth.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Office Online embed viewer.
const OFFICE_VIEWER: &str = "https://view.officeapps.live.com/op/embed.aspx?src=";

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Where a presentation file is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    S3,
    Dropbox,
    Gdrive,
    Gslides,
    Onedrive,
    Local,
    Other,
}

/// Whether a URL points at a file served by this deployment.
pub fn looks_local(url: &str) -> bool {
    url.starts_with('/') || url.starts_with("file:") || url.starts_with("blob:")
}

/// Classify a URL by host pattern.
pub fn source_type(url: &str, is_local: bool) -> SourceType {
    if is_local {
        SourceType::Local
    } else if url.contains("s3.amazonaws.com") {
        SourceType::S3
    } else if url.contains("dropbox.com") {
        SourceType::Dropbox
    } else if url.contains("drive.google.com") {
        SourceType::Gdrive
    } else if url.contains("docs.google.com/presentation") {
        SourceType::Gslides
    } else if url.contains("onedrive.live.com") || url.contains("sharepoint.com") {
        SourceType::Onedrive
    } else {
        SourceType::Other
    }
}

/// Lower-cased file extension of the URL path, falling back to what the
/// source exports (`pptx` for Google Slides) and then `unknown`.
pub fn file_type(url: &str, source: SourceType) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ if source == SourceType::Gslides => "pptx".to_string(),
        _ => "unknown".to_string(),
    }
}

/// URL that downloads the file itself rather than a sharing page.
///
/// Applying it to its own output returns the output unchanged.
pub fn direct_url(url: &str, source: SourceType) -> String {
    match source {
        SourceType::Dropbox => dropbox_direct(url),
        SourceType::Gdrive => match path_segment_after(url, "/file/d/") {
            Some(file_id) => format!("https://drive.google.com/uc?export=download&id={file_id}"),
            None => url.to_string(),
        },
        SourceType::Gslides => match path_segment_after(url, "/presentation/d/") {
            Some(id) => format!("https://docs.google.com/presentation/d/{id}/export/pptx"),
            None => url.to_string(),
        },
        _ => url.to_string(),
    }
}

/// Embeddable viewer URL for remote files; `None` for local ones.
pub fn viewer_url(direct: &str, is_local: bool) -> Option<String> {
    if is_local {
        return None;
    }
    Some(format!(
        "{OFFICE_VIEWER}{}",
        utf8_percent_encode(direct, URI_COMPONENT)
    ))
}

fn dropbox_direct(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    if without_query.contains("www.dropbox.com/s/dl/") {
        return without_query.to_string();
    }
    without_query.replacen("www.dropbox.com/s/", "www.dropbox.com/s/dl/", 1)
}

/// The path segment following `marker`, e.g. the file id in `/file/d/{id}/view`.
fn path_segment_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let segment = &rest[..end];
    (!segment.is_empty()).then_some(segment)
}
