use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    db::ScoreBook,
    error::AppResult,
    models::{LibraryItem, RatingKey},
};

/// Summary of one desired collection member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub rating_key: RatingKey,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub points: i64,
}

/// Desired collection state written by a curation run for the off-peak refresher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub rating_keys: Vec<RatingKey>,
    pub items: Vec<SnapshotItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl CollectionSnapshot {
    pub fn from_items(items: &[LibraryItem], scores: &ScoreBook) -> Self {
        Self {
            rating_keys: items.iter().map(|item| item.key.clone()).collect(),
            items: items
                .iter()
                .map(|item| SnapshotItem {
                    rating_key: item.key.clone(),
                    title: item.title.clone(),
                    year: item.year,
                    points: scores.get_points(&item.key),
                })
                .collect(),
            generated_at: Some(Utc::now()),
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), items = self.items.len(), "Saved collection snapshot");
        Ok(())
    }

    /// `None` when the file is absent or unreadable
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::info!(path = %path.display(), error = %e, "Collection snapshot not available");
                return None;
            }
        };

        match serde_json::from_str::<Self>(&raw) {
            Ok(snapshot) => {
                tracing::info!(path = %path.display(), items = snapshot.items.len(), "Loaded collection snapshot");
                Some(snapshot)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Invalid collection snapshot");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rating_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rating_keys.is_empty()
    }
}
