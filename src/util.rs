use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Replaces every non-ASCII-alphanumeric char with `_`.
pub fn sanitize_name(name: &str) -> String {
    NON_ALNUM_RE.replace_all(name, "_").into_owned()
}

/// `{sanitized}_{id}.{ext}` — name used for downloads and archive entries.
pub fn export_file_name(name: &str, id: &str, ext: &str) -> String {
    format!("{}_{}.{}", sanitize_name(name), id, ext)
}

/// Extension of a client-supplied file name, lowercased and stripped to
/// alphanumerics. Falls back to `jpg`.
pub fn upload_extension(file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .map(|ext| NON_ALNUM_RE.replace_all(&ext, "").into_owned())
        .unwrap_or_default();
    if ext.is_empty() {
        "jpg".into()
    } else {
        ext
    }
}
