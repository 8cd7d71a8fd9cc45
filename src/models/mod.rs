use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Display};

/// Stable identifier the media library assigns to an item (Plex `ratingKey`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingKey(pub String);

impl RatingKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RatingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RatingKey {
    fn from(key: &str) -> Self {
        RatingKey(key.to_string())
    }
}

impl From<String> for RatingKey {
    fn from(key: String) -> Self {
        RatingKey(key)
    }
}

impl From<u64> for RatingKey {
    fn from(key: u64) -> Self {
        RatingKey(key.to_string())
    }
}

/// Kind of library item, as reported by the media library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
    Season,
    Episode,
    Clip,
    #[serde(other)]
    Unknown,
}

impl From<&str> for MediaType {
    fn from(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "movie" => MediaType::Movie,
            "show" => MediaType::Show,
            "season" => MediaType::Season,
            "episode" => MediaType::Episode,
            "clip" => MediaType::Clip,
            _ => MediaType::Unknown,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
            MediaType::Season => "season",
            MediaType::Episode => "episode",
            MediaType::Clip => "clip",
            MediaType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// An item in the media library, detached from any client object model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub key: RatingKey,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
}

impl LibraryItem {
    pub fn movie(key: impl Into<RatingKey>, title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            year,
            media_type: MediaType::Movie,
        }
    }

    /// Lowercased title used as the deterministic tie-breaker when ranking
    pub fn sort_title(&self) -> String {
        self.title.trim().to_lowercase()
    }

    /// "Title (Year)" when the year is known
    pub fn display_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// Live membership of a library collection, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState {
    pub id: String,
    pub name: String,
    pub items: Vec<LibraryItem>,
}

impl CollectionState {
    pub fn keys(&self) -> HashSet<RatingKey> {
        self.items.iter().map(|item| item.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A prospective collection member for the current run
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub item: LibraryItem,
    pub points: i64,
    pub rating: Option<f64>,
}

/// Ranked candidates that should make up the collection after this run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSet {
    pub candidates: Vec<Candidate>,
    /// Keys that were freshly recommended this run
    pub recommended_now: Vec<RatingKey>,
    /// Candidates dropped by the ranking filter
    pub dropped: Vec<Candidate>,
}

impl DesiredSet {
    pub fn items(&self) -> Vec<LibraryItem> {
        self.candidates.iter().map(|c| c.item.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Result of an external call whose failure must not abort the run
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T = ()> {
    Success(T),
    Skipped(String),
    Failed(String),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// What the download manager did with a title that is missing from the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    Added,
    Monitored,
    AlreadyMonitored,
}

/// One stored version of a library movie (a Plex "media" entry)
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCopy {
    pub id: String,
    /// Path of the first part
    pub file: String,
    /// Bytes across all parts
    pub size: u64,
    /// Video resolution label, e.g. `1080` or `4k`
    pub quality: String,
}

/// Library movie with the identity and file details the maintenance steps need
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryMovie {
    pub item: LibraryItem,
    pub tmdb_id: Option<u64>,
    /// Unix seconds
    pub added_at: Option<i64>,
    pub copies: Vec<MediaCopy>,
}

/// A movie tracked by the download manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedMovie {
    pub id: u64,
    pub title: String,
    pub tmdb_id: Option<u64>,
    pub monitored: bool,
}
