//! Extract Drive file, folder and spreadsheet ids from share URLs.

use regex::Regex;
use std::sync::LazyLock;

use thiserror::Error;

/// Input was neither a recognised Google URL nor a bare id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid URL or ID: {0}")]
pub struct InvalidId(pub String);

/// Recognised URL shapes; the first capture group is the id.
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/(?:open|uc)\?(?:.*&)?id=([a-zA-Z0-9_-]+)",
        r"^https?://docs\.google\.com/(?:spreadsheets|document|presentation)/(?:u/\d+/)?d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid URL regex"))
    .collect()
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Drive id from a URL or validate a raw id.
///
/// Supports the following URL formats:
/// - `https://drive.google.com/drive/folders/<ID>` (optionally `/u/<n>/`)
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/open?id=<ID>` and `uc?id=<ID>`
/// - `https://docs.google.com/spreadsheets/d/<ID>/edit` (also documents and presentations)
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use gconnector::url_parser::extract_id;
///
/// let id = extract_id("https://docs.google.com/spreadsheets/d/1abc123/edit#gid=0").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String, InvalidId> {
    let trimmed = url_or_id.trim();

    let from_url = URL_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(trimmed)?.get(1));
    if let Some(id) = from_url {
        return Ok(id.as_str().to_string());
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(InvalidId(url_or_id.to_string()))
}
