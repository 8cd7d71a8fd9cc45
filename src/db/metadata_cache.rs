//! Title → metadata id and id → rating lookups, cached on disk.
//!
//! Entries are never invalidated. A failed title lookup is stored as `null`
//! and stays that way across loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{cached, models::CallOutcome, services::providers::MetadataProvider};

/// Accepts both the legacy (`id_cache`/`rating_cache`) and the newer
/// (`ids`/`ratings`) key names. Legacy names win when both are present.
#[derive(Debug, Default, Deserialize)]
struct StoredCache {
    #[serde(default)]
    id_cache: Option<BTreeMap<String, Option<u64>>>,
    #[serde(default)]
    rating_cache: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    ids: Option<BTreeMap<String, Option<u64>>>,
    #[serde(default)]
    ratings: Option<BTreeMap<String, Option<f64>>>,
}

/// Always written with the legacy key names so other consumers keep working
#[derive(Debug, Serialize)]
struct WrittenCache<'a> {
    id_cache: &'a BTreeMap<String, Option<u64>>,
    rating_cache: &'a BTreeMap<String, f64>,
}

type Tables = (BTreeMap<String, Option<u64>>, BTreeMap<String, f64>);

fn normalize(stored: StoredCache) -> Tables {
    let legacy = stored.id_cache.is_some() || stored.rating_cache.is_some();
    let (ids, ratings) = if legacy {
        (stored.id_cache, stored.rating_cache)
    } else {
        (stored.ids, stored.ratings)
    };

    let ratings = ratings
        .unwrap_or_default()
        .into_iter()
        .map(|(id, rating)| (id, rating.unwrap_or(0.0)))
        .collect();

    (ids.unwrap_or_default(), ratings)
}

pub struct MetadataCache {
    path: PathBuf,
    ids: BTreeMap<String, Option<u64>>,
    ratings: BTreeMap<String, f64>,
    provider: Arc<dyn MetadataProvider>,
}

impl MetadataCache {
    /// Loads the cache file, creating it when missing and resetting it when unreadable
    pub fn load(path: impl Into<PathBuf>, provider: Arc<dyn MetadataProvider>) -> Self {
        let path = path.into();
        let mut cache = Self {
            path,
            ids: BTreeMap::new(),
            ratings: BTreeMap::new(),
            provider,
        };

        match read_tables(&cache.path) {
            Ok(Some((ids, ratings))) => {
                tracing::info!(
                    path = %cache.path.display(),
                    ids = ids.len(),
                    ratings = ratings.len(),
                    "Loaded metadata cache"
                );
                cache.ids = ids;
                cache.ratings = ratings;
            }
            Ok(None) => {
                tracing::info!(path = %cache.path.display(), "Metadata cache not found, creating it");
                cache.save();
            }
            Err(e) => {
                tracing::error!(
                    path = %cache.path.display(),
                    error = %e,
                    "Failed to load metadata cache, resetting"
                );
                cache.save();
            }
        }

        cache
    }

    /// Metadata id for `title`; only the first lookup per title reaches the provider
    pub async fn get_external_id(&mut self, title: &str) -> Option<u64> {
        if title.trim().is_empty() {
            return None;
        }

        cached!(
            self.ids,
            title.to_string(),
            self.save(),
            self.fetch_id(title)
        )
    }

    /// Rating (0–10) for `id`, 0.0 when unknown
    pub async fn get_rating(&mut self, id: u64) -> f64 {
        if id == 0 {
            return 0.0;
        }

        cached!(self.ratings, id.to_string(), self.save(), self.fetch_rating(id))
    }

    /// Rating for a title, resolving its id first. `None` when the id cannot be resolved.
    pub async fn rating_for_title(&mut self, title: &str) -> Option<f64> {
        let id = self.get_external_id(title).await?;
        Some(self.get_rating(id).await)
    }

    async fn fetch_id(&self, title: &str) -> Option<u64> {
        match self.provider.search_movie_id(title).await {
            Ok(id) => {
                tracing::debug!(title = %title, id = ?id, provider = self.provider.name(), "Resolved metadata id");
                id
            }
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Metadata id lookup failed");
                None
            }
        }
    }

    async fn fetch_rating(&self, id: u64) -> f64 {
        match self.provider.movie_rating(id).await {
            Ok(rating) => rating,
            Err(e) => {
                tracing::warn!(id = id, error = %e, "Metadata rating lookup failed");
                0.0
            }
        }
    }

    /// Writes the cache to disk, logging instead of failing
    pub fn save(&self) -> CallOutcome {
        let written = WrittenCache {
            id_cache: &self.ids,
            rating_cache: &self.ratings,
        };

        let result = (|| -> crate::error::AppResult<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, serde_json::to_string_pretty(&written)?)?;
            Ok(())
        })();

        match result {
            Ok(()) => CallOutcome::Success(()),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed writing metadata cache");
                CallOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn ids(&self) -> &BTreeMap<String, Option<u64>> {
        &self.ids
    }

    pub fn ratings(&self) -> &BTreeMap<String, f64> {
        &self.ratings
    }
}

fn read_tables(path: &Path) -> crate::error::AppResult<Option<Tables>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let stored: StoredCache = serde_json::from_str(&raw)?;
    Ok(Some(normalize(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockMetadataProvider;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn idle_provider() -> Arc<dyn MetadataProvider> {
        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("mock");
        provider.expect_search_movie_id().never();
        provider.expect_movie_rating().never();
        Arc::new(provider)
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_id_miss_fetches_once_then_hits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_search_movie_id()
            .times(1)
            .returning(|_| Ok(Some(27205)));
        let mut cache = MetadataCache::load(&path, Arc::new(provider));

        assert_eq!(cache.get_external_id("Inception").await, Some(27205));
        assert_eq!(cache.get_external_id("Inception").await, Some(27205));

        // persisted immediately after the miss
        assert_eq!(read_json(&path)["id_cache"]["Inception"], json!(27205));
    }

    #[tokio::test]
    async fn test_failed_lookup_is_cached_as_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_search_movie_id()
            .times(1)
            .returning(|_| Err(crate::error::AppError::ExternalApi("down".to_string())));
        let mut cache = MetadataCache::load(&path, Arc::new(provider));

        assert_eq!(cache.get_external_id("Nope").await, None);
        assert_eq!(cache.get_external_id("Nope").await, None);
        assert_eq!(read_json(&path)["id_cache"]["Nope"], Value::Null);

        // a later load keeps the null and never asks again
        let mut reloaded = MetadataCache::load(&path, idle_provider());
        assert_eq!(reloaded.get_external_id("Nope").await, None);
    }

    #[tokio::test]
    async fn test_rating_defaults_to_zero_on_error() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_movie_rating()
            .times(1)
            .returning(|_| Err(crate::error::AppError::ExternalApi("500".to_string())));
        let mut cache = MetadataCache::load(dir.path().join("cache.json"), Arc::new(provider));

        assert_eq!(cache.get_rating(603).await, 0.0);
        assert_eq!(cache.get_rating(603).await, 0.0);
        assert_eq!(cache.ratings().get("603"), Some(&0.0));
    }

    #[tokio::test]
    async fn test_empty_title_and_zero_id_skip_lookup() {
        let dir = TempDir::new().unwrap();
        let mut cache = MetadataCache::load(dir.path().join("cache.json"), idle_provider());
        assert_eq!(cache.get_external_id("  ").await, None);
        assert_eq!(cache.get_rating(0).await, 0.0);
    }

    #[tokio::test]
    async fn test_rating_for_title() {
        let dir = TempDir::new().unwrap();
        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_search_movie_id()
            .returning(|title| Ok(if title == "Heat" { Some(949) } else { None }));
        provider.expect_movie_rating().returning(|_| Ok(8.3));
        let mut cache = MetadataCache::load(dir.path().join("cache.json"), Arc::new(provider));

        assert_eq!(cache.rating_for_title("Heat").await, Some(8.3));
        assert_eq!(cache.rating_for_title("Unknown").await, None);
    }

    #[test]
    fn test_round_trip_legacy_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            json!({
                "id_cache": {"Heat": 949, "Nope": null},
                "rating_cache": {"949": 7.9}
            })
            .to_string(),
        )
        .unwrap();

        let cache = MetadataCache::load(&path, idle_provider());
        let (ids, ratings) = (cache.ids().clone(), cache.ratings().clone());
        cache.save();

        let reloaded = MetadataCache::load(&path, idle_provider());
        assert_eq!(reloaded.ids(), &ids);
        assert_eq!(reloaded.ratings(), &ratings);
        assert_eq!(ids.get("Nope"), Some(&None));
    }

    #[test]
    fn test_current_names_load_and_save_as_legacy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            json!({
                "ids": {"Heat": 949},
                "ratings": {"949": 7.9}
            })
            .to_string(),
        )
        .unwrap();

        let cache = MetadataCache::load(&path, idle_provider());
        assert_eq!(cache.ids().get("Heat"), Some(&Some(949)));
        assert_eq!(cache.ratings().get("949"), Some(&7.9));

        cache.save();
        let written = read_json(&path);
        assert_eq!(
            written,
            json!({"id_cache": {"Heat": 949}, "rating_cache": {"949": 7.9}})
        );

        let reloaded = MetadataCache::load(&path, idle_provider());
        assert_eq!(reloaded.ids(), cache.ids());
        assert_eq!(reloaded.ratings(), cache.ratings());
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("cache.json");
        let cache = MetadataCache::load(&path, idle_provider());
        assert!(cache.ids().is_empty());
        assert_eq!(read_json(&path), json!({"id_cache": {}, "rating_cache": {}}));
    }

    #[test]
    fn test_corrupt_file_is_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "garbage").unwrap();

        let cache = MetadataCache::load(&path, idle_provider());
        assert!(cache.ids().is_empty());
        assert_eq!(read_json(&path), json!({"id_cache": {}, "rating_cache": {}}));
    }
}
