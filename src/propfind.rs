//! Depth-1 PROPFIND response parsing.
//!
//! WebDAV servers answer a listing request with a multistatus document
//! whose namespace prefixes vary wildly between implementations
//! (`d:`, `D:`, `lp1:`, none at all, `iscollection` instead of
//! `resourcetype`). The parser scans for tags with any prefix instead of
//! doing strict XML processing, which has proven robust across servers.

use regex::Regex;

use crate::types::DavEntry;

/// The request body asking for the properties a listing needs.
pub(crate) const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:resourcetype/>
        <d:getcontentlength/>
        <d:getlastmodified/>
        <d:getcontenttype/>
        <d:getetag/>
    </d:prop>
</d:propfind>"#;

/// Parse a multistatus body into the immediate children of the listed
/// folder. `folder_href` is the public URL of the folder itself; the
/// response element referring to it (the implicit self-reference) is
/// dropped, so an empty folder parses to an empty vec.
pub(crate) fn parse_multistatus(xml: &str, folder_href: &str) -> Vec<DavEntry> {
    let response_pattern = match Regex::new(
        r"(?s)<(?:[a-zA-Z0-9_]+:)?response[^>]*>(.*?)</(?:[a-zA-Z0-9_]+:)?response>",
    ) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("multistatus response pattern failed to compile: {}", e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for cap in response_pattern.captures_iter(xml) {
        let Some(content) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let Some(href) = extract_tag_content(content, "href") else {
            tracing::warn!("multistatus response element without href, skipping");
            continue;
        };

        let decoded_href = urlencoding::decode(&href)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| href.clone());

        if is_self_reference(&decoded_href, folder_href) {
            continue;
        }

        let name = decoded_href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
            .to_string();
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }

        let is_dir = has_collection_resourcetype(content)
            || content.to_lowercase().contains("iscollection>1</")
            || href.ends_with('/');

        let size: u64 = extract_tag_content(content, "getcontentlength")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        entries.push(DavEntry {
            name,
            is_dir,
            size,
            modified: extract_tag_content(content, "getlastmodified"),
            mime_type: extract_tag_content(content, "getcontenttype"),
            etag: extract_tag_content(content, "getetag"),
        });
    }

    entries
}

/// An href refers to the listed folder itself when it matches the folder's
/// public URL or its path component, in any of the forms servers use:
/// full URL, absolute path, with or without trailing slash.
fn is_self_reference(decoded_href: &str, folder_href: &str) -> bool {
    let href = decoded_href.trim_end_matches('/');
    let folder = folder_href.trim_end_matches('/');
    if href == folder {
        return true;
    }
    // Absolute-path href against the folder URL's path component
    let folder_path = folder
        .find("://")
        .and_then(|i| folder[i + 3..].find('/').map(|j| i + 3 + j))
        .map(|i| &folder[i..])
        .unwrap_or("");
    !folder_path.is_empty() && href == folder_path
}

/// Whether the resourcetype block of a response element marks a collection.
fn has_collection_resourcetype(content: &str) -> bool {
    let lower = content.to_lowercase();
    let Some(start) = lower.find("resourcetype>") else {
        return false;
    };
    let after = start + "resourcetype>".len();
    match lower[after..].find("resourcetype>") {
        Some(end) => lower[after..after + end].contains("collection"),
        None => false,
    }
}

/// Extract the text content of a tag, tolerating any namespace prefix.
fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let patterns = [
        format!(
            r"<[a-zA-Z][a-zA-Z0-9]*:{}[^>]*>([^<]*)</[a-zA-Z][a-zA-Z0-9]*:{}>",
            tag, tag
        ),
        format!(r"<{}[^>]*>([^<]*)</{}>", tag, tag),
    ];

    for pattern in patterns {
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(cap) = re.captures(xml) {
                if let Some(content) = cap.get(1) {
                    let text = content.as_str().trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
    }

    None
}
