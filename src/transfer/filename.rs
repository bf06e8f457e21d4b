//! Filename derivation, sanitization, and unique-path resolution.
//!
//! A destination name is derived once per fresh transfer, in this precedence
//! order: Content-Disposition (RFC 5987 star form preferred over the quoted
//! form), the last URL path segment when it carries an extension, and finally
//! a generated `download_<timestamp>` name with an extension mapped from the
//! declared media type.

use std::path::{Component, Path, PathBuf};

use chrono::Local;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use url::Url;

use super::constants::STAGING_SUFFIX;

/// Derives the destination filename for a response.
///
/// Purely computational: no network access, no filesystem access.
#[must_use]
pub fn derive_name(url: &Url, headers: &HeaderMap) -> String {
    if let Some(disposition) = headers.get(CONTENT_DISPOSITION).and_then(|v| v.to_str().ok())
        && let Some(asserted) = parse_content_disposition(disposition)
    {
        let sanitized = sanitize_filename(&asserted);
        if !sanitized.is_empty() {
            return sanitized;
        }
    }

    if let Some(last) = url.path_segments().and_then(|mut segments| segments.next_back())
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| last.to_string());
        if decoded.contains('.') {
            let sanitized = sanitize_filename(&decoded);
            if !sanitized.is_empty() {
                return sanitized;
            }
        }
    }

    let extension = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(extension_for_media_type)
        .unwrap_or_default();
    format!("download_{}{extension}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Parses a Content-Disposition header into a filename.
///
/// The extended `filename*=` form (RFC 5987) takes precedence over the plain
/// `filename=` form, matching what servers that send both intend.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(position) = header.find("filename*=") {
        let value = header[position + "filename*=".len()..].trim();
        // Format: charset'language'percent-encoded-value
        if let Some(quotes) = value.find("''") {
            let encoded = &value[quotes + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                let decoded = decoded.into_owned();
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        }
    }

    if let Some(position) = header.find("filename=") {
        let value = header[position + "filename=".len()..].trim();
        if let Some(quoted) = value.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                let name = &quoted[..end];
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let name = value[..end].trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Maps a declared media type onto a file extension.
///
/// Unknown or unmapped types fall back to the generic `.dat` extension.
pub(crate) fn extension_for_media_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "application/pdf" => ".pdf",
        "text/plain" => ".txt",
        "text/html" => ".html",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.ms-powerpoint" => ".ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/zip" | "application/x-zip-compressed" => ".zip",
        "application/x-7z-compressed" => ".7z",
        "application/gzip" => ".gz",
        "application/x-tar" => ".tar",
        "application/x-rar-compressed" => ".rar",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "audio/mpeg" => ".mp3",
        "audio/wav" => ".wav",
        "audio/ogg" => ".ogg",
        "video/mp4" => ".mp4",
        "video/quicktime" => ".mov",
        "video/x-msvideo" => ".avi",
        "video/x-matroska" => ".mkv",
        "video/webm" => ".webm",
        "application/x-msdownload" => ".exe",
        "application/octet-stream" => ".bin",
        "application/x-sh" => ".sh",
        _ => ".dat",
    }
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces separators and characters invalid on common filesystems, and
/// rewrites dot-only segments so a header-supplied name can never climb out
/// of the download directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if is_plain_segment(trimmed) {
        trimmed.to_string()
    } else {
        trimmed
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_plain_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Resolves a collision-free path for `file_name` inside `directory`.
///
/// If the plain path is taken, a counter is appended in parentheses before
/// the extension: `name (1).ext`, `name (2).ext`, and so on. Only existence
/// checks are performed; nothing is created.
#[must_use]
pub fn unique_path(directory: &Path, file_name: &str) -> PathBuf {
    let base = directory.join(file_name);
    if !base.exists() {
        return base;
    }

    let (stem, extension) = split_extension(file_name);
    let mut counter = 1u32;
    loop {
        let candidate = directory.join(format!("{stem} ({counter}){extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Splits a filename into stem and extension (extension keeps its dot).
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(position) if position > 0 => (&file_name[..position], &file_name[position..]),
        _ => (file_name, ""),
    }
}

/// Returns the staging path for a final destination path.
pub(crate) fn staging_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.file_name().map_or_else(
        || std::ffi::OsString::from("download"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(STAGING_SUFFIX);
    final_path.with_file_name(name)
}

/// Strips the staging suffix from a staging path, if present.
pub(crate) fn final_path_for(staging_path: &Path) -> PathBuf {
    if let Some(name) = staging_path.file_name().and_then(std::ffi::OsStr::to_str)
        && let Some(stripped) = name.strip_suffix(STAGING_SUFFIX)
        && !stripped.is_empty()
    {
        return staging_path.with_file_name(stripped);
    }
    staging_path.to_path_buf()
}
