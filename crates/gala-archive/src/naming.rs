//! Deterministic, filesystem-safe naming for archive entries and the
//! archive container itself.
//!
//! Pure functions of the item/event attributes: no I/O, no randomness, no
//! hidden state. Entry names combine a sortable timestamp, the prompt and
//! uploader labels, and a short token of the upload id; the id token makes
//! collisions within one export practically impossible without any global
//! uniqueness bookkeeping.

use crate::plan::ExportItem;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Maximum length of a single sanitized text token, in characters.
const TOKEN_MAX: usize = 32;
/// Maximum length of a full entry name, in characters. Stays well under the
/// 255-byte per-component limits of common filesystems after extraction.
const ENTRY_NAME_MAX: usize = 140;
/// Hex characters of the upload id kept in the entry name.
const ID_TOKEN_LEN: usize = 8;

const DEFAULT_PROMPT_LABEL: &str = "photo";
const DEFAULT_UPLOADER_LABEL: &str = "anonymous";
const DEFAULT_EXTENSION: &str = "jpg";

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]+").expect("static pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));
static HYPHEN_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("static pattern"));

/// Container file name for an event's export.
pub fn archive_filename(public_id: &str) -> String {
    format!("gallery-{}.zip", sanitize_token(public_id, 64))
}

/// Archive entry name for one photo:
/// `YYYYMMDD-HHMM-<prompt>-<uploader>-<id8>.<ext>`.
pub fn entry_name(item: &ExportItem) -> String {
    let timestamp = item.created_at.format("%Y%m%d-%H%M");
    let prompt = sanitize_token(
        item.prompt_label.as_deref().unwrap_or(DEFAULT_PROMPT_LABEL),
        TOKEN_MAX,
    );
    let uploader = sanitize_token(
        item.uploader_name
            .as_deref()
            .unwrap_or(DEFAULT_UPLOADER_LABEL),
        TOKEN_MAX,
    );
    let id_token: String = item
        .id
        .simple()
        .to_string()
        .chars()
        .take(ID_TOKEN_LEN)
        .collect();
    let extension = infer_extension(
        item.original_name.as_deref().or(item.file_name.as_deref()),
        item.content_type.as_deref(),
    );

    let stem = format!("{timestamp}-{prompt}-{uploader}-{id_token}");
    let stem_max = ENTRY_NAME_MAX - extension.len() - 1;
    let stem: String = stem.chars().take(stem_max).collect();
    let stem = stem.trim_matches('-');

    format!("{stem}.{extension}")
}

/// Reduce arbitrary text to a lowercase token of word characters and single
/// hyphens, at most `max` characters, never empty.
fn sanitize_token(raw: &str, max: usize) -> String {
    let cleaned = NON_WORD.replace_all(raw, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, "-");
    let cleaned = HYPHEN_RUNS.replace_all(&cleaned, "-");
    let cleaned = cleaned.trim_matches('-').to_lowercase();
    let capped: String = cleaned.chars().take(max).collect();
    let capped = capped.trim_matches('-');
    if capped.is_empty() {
        "x".to_string()
    } else {
        capped.to_string()
    }
}

/// File extension for an entry: the stored filename's extension when it is
/// short and plausible, else a known mapping of the MIME type, else `jpg`.
fn infer_extension(stored_name: Option<&str>, content_type: Option<&str>) -> String {
    if let Some(ext) = stored_name.and_then(plausible_extension) {
        return ext;
    }
    if let Some(ext) = content_type.and_then(extension_for_mime) {
        return ext.to_string();
    }
    DEFAULT_EXTENSION.to_string()
}

fn plausible_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        _ => None,
    }
}
