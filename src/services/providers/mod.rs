//! External collaborators
//!
//! Each service the curator talks to sits behind a narrow trait so the
//! scoring and reconciliation logic never depends on a concrete client.
//! Clients translate their wire formats into [`LibraryItem`] and friends at
//! the boundary.
use crate::{
    error::AppResult,
    models::{AcquisitionOutcome, CollectionState, LibraryItem, LibraryMovie, ManagedMovie, RatingKey},
};

pub mod openai;
pub mod plex;
pub mod radarr;
pub mod tmdb;

#[cfg(test)]
pub(crate) mod memory;

pub use openai::OpenAiRecommender;
pub use plex::PlexLibrary;
pub use radarr::RadarrClient;
pub use tmdb::TmdbClient;

/// Media library holding the curated collection
#[async_trait::async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Search the movie section by title
    async fn search_movies(&self, title: &str) -> AppResult<Vec<LibraryItem>>;

    /// Fetch a single item by key. `Ok(None)` when the key no longer resolves.
    async fn fetch_item(&self, key: &RatingKey) -> AppResult<Option<LibraryItem>>;

    /// Live state of the named collection, `Ok(None)` when it does not exist
    async fn collection(&self, name: &str) -> AppResult<Option<CollectionState>>;

    /// Create a collection seeded with `items`
    async fn create_collection(&self, name: &str, items: &[LibraryItem]) -> AppResult<CollectionState>;

    async fn add_items(&self, collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()>;

    async fn remove_items(&self, collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()>;

    /// Switch the collection to explicit (custom) ordering
    async fn set_custom_order(&self, collection: &CollectionState) -> AppResult<()>;

    /// Move `item` right after `after`, or to the head when `after` is `None`
    async fn move_item(
        &self,
        collection: &CollectionState,
        item: &RatingKey,
        after: Option<&RatingKey>,
    ) -> AppResult<()>;

    /// Every movie in the section with its external id and stored copies
    async fn movie_inventory(&self) -> AppResult<Vec<LibraryMovie>>;

    /// Delete one stored copy of `item`, files included
    async fn delete_copy(&self, item: &RatingKey, copy_id: &str) -> AppResult<()>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Movie metadata service (ids, ratings, similar titles)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Best-matching movie id for a title, `Ok(None)` when nothing matches
    async fn search_movie_id(&self, title: &str) -> AppResult<Option<u64>>;

    /// Average rating on a 0–10 scale
    async fn movie_rating(&self, id: u64) -> AppResult<f64>;

    /// Titles similar to `seed`, best first
    async fn similar_titles(&self, seed: &str, limit: usize) -> AppResult<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Language-model recommendation source
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Recommender: Send + Sync {
    /// Up to `limit` movie titles similar to `seed`
    async fn recommend(&self, seed: &str, limit: usize) -> AppResult<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Download manager that acquires titles missing from the library
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DownloadManager: Send + Sync {
    /// Add `title` (and search for it) or make sure an existing entry is monitored.
    /// `Ok(None)` when the title cannot be resolved.
    async fn request_title(&self, title: &str) -> AppResult<Option<AcquisitionOutcome>>;

    /// Movies the download manager is currently monitoring
    async fn monitored_movies(&self) -> AppResult<Vec<ManagedMovie>>;

    /// Stop monitoring a movie, leaving its files and history alone
    async fn unmonitor(&self, movie: &ManagedMovie) -> AppResult<()>;

    fn name(&self) -> &'static str;
}
