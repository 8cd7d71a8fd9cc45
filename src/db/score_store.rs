//! Persistent per-item points.
//!
//! The file is a JSON object keyed by rating key. Values written by older
//! releases may be bare integers or records carrying `score` instead of
//! `points`; both are normalized into [`ScoreEntry`] on load.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{CallOutcome, RatingKey};

/// Points record for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub points: i64,
    /// Fields written by other tools, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScoreEntry {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => {
                let points = fields
                    .get("points")
                    .or_else(|| fields.get("score"))
                    .map(coerce_points)
                    .unwrap_or(0);
                let title = fields
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let extra = fields
                    .iter()
                    .filter(|(k, _)| !matches!(k.as_str(), "points" | "score" | "title"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                ScoreEntry {
                    title,
                    points,
                    extra,
                }
            }
            other => ScoreEntry {
                points: coerce_points(other),
                ..Default::default()
            },
        }
    }
}

/// Integers pass through, floats truncate, numeric strings parse, anything else is 0
fn coerce_points(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

/// In-memory view of the points file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBook {
    entries: BTreeMap<String, ScoreEntry>,
}

impl ScoreBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the points file. Never fails: a missing file, unreadable file or
    /// non-object document all yield an empty book.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Points file not found, starting empty");
                return Self::new();
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed reading points file");
                return Self::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => {
                let entries: BTreeMap<String, ScoreEntry> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), ScoreEntry::from_value(value)))
                    .collect();
                tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded points file");
                Self { entries }
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Points file is not a JSON object, ignoring");
                Self::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Invalid JSON in points file");
                Self::new()
            }
        }
    }

    /// Writes the whole book back, pretty-printed. Failures are logged and
    /// reported, never raised.
    pub fn save(&self, path: &Path) -> CallOutcome {
        match self.write(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), entries = self.entries.len(), "Saved points file");
                CallOutcome::Success(())
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed writing points file");
                CallOutcome::Failed(e.to_string())
            }
        }
    }

    fn write(&self, path: &Path) -> crate::error::AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Points for `key`, 0 when absent
    pub fn get_points(&self, key: &RatingKey) -> i64 {
        self.entries
            .get(key.as_str())
            .map(|entry| entry.points)
            .unwrap_or(0)
    }

    /// Sets points for `key`, keeping any other fields already stored on the record
    pub fn set_points(&mut self, key: &RatingKey, points: i64) {
        self.entries.entry(key.0.clone()).or_default().points = points;
    }

    /// Keeps the denormalized title in sync with the library
    pub fn set_title(&mut self, key: &RatingKey, title: &str) {
        if let Some(entry) = self.entries.get_mut(key.as_str()) {
            entry.title = Some(title.to_string());
        }
    }

    pub fn contains(&self, key: &RatingKey) -> bool {
        self.entries.contains_key(key.as_str())
    }

    pub fn get(&self, key: &RatingKey) -> Option<&ScoreEntry> {
        self.entries.get(key.as_str())
    }

    /// Deletes every entry at or below zero, returning how many were dropped
    pub fn prune_non_positive(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.points > 0);
        before - self.entries.len()
    }

    pub fn keys(&self) -> Vec<RatingKey> {
        self.entries.keys().cloned().map(RatingKey).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
