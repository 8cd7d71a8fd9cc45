use regex::Regex;
use std::sync::OnceLock;

use crate::{
    error::AppResult,
    models::{LibraryItem, MediaType},
    services::providers::MediaLibrary,
};

fn trailing_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d{4}\)\s*$").expect("valid regex"))
}

/// Comparison form of a title: trailing `(YYYY)` dropped, trimmed, lowercased
pub fn normalize_title(title: &str) -> String {
    trailing_year().replace(title, "").trim().to_lowercase()
}

/// Service function for library title lookup
///
/// Runs the library's own search, then keeps the first movie whose
/// normalized title matches exactly. Search errors propagate so callers can
/// tell "not in library" apart from "lookup failed".
pub async fn find_movie(library: &dyn MediaLibrary, title: &str) -> AppResult<Option<LibraryItem>> {
    let query = trailing_year().replace(title, "");
    let results = library.search_movies(query.trim()).await?;
    let target = normalize_title(title);

    Ok(results
        .into_iter()
        .find(|item| item.media_type == MediaType::Movie && normalize_title(&item.title) == target))
}
