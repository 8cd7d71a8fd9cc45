//! Brings the library collection in line with a desired set.

use std::collections::HashSet;
use std::time::Duration;

use crate::{
    error::AppResult,
    models::{CollectionState, LibraryItem, RatingKey},
    services::providers::MediaLibrary,
};

/// Pause after this many move calls
const MOVE_BATCH: usize = 50;
const MOVE_PAUSE: Duration = Duration::from_millis(100);

/// Membership changes needed to turn `current` into `desired`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionDiff {
    pub to_remove: Vec<LibraryItem>,
    pub to_add: Vec<LibraryItem>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Set difference by key in both directions. Input order is preserved.
pub fn diff(current: &[LibraryItem], desired: &[LibraryItem]) -> CollectionDiff {
    let current_keys: HashSet<&RatingKey> = current.iter().map(|i| &i.key).collect();
    let desired_keys: HashSet<&RatingKey> = desired.iter().map(|i| &i.key).collect();

    let mut seen = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|i| !current_keys.contains(&i.key) && seen.insert(&i.key))
        .cloned()
        .collect();
    let to_remove = current
        .iter()
        .filter(|i| !desired_keys.contains(&i.key))
        .cloned()
        .collect();

    CollectionDiff { to_remove, to_add }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedMove {
    pub key: RatingKey,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReorderReport {
    pub attempted: usize,
    pub moved: usize,
    pub failed: Vec<FailedMove>,
    /// Set when ordering was abandoned before any move
    pub skipped_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub created: bool,
    pub removed: usize,
    pub added: usize,
    pub dry_run: bool,
    pub reorder: Option<ReorderReport>,
}

pub struct CollectionReconciler<'a> {
    library: &'a dyn MediaLibrary,
    collection_name: String,
    dry_run: bool,
}

impl<'a> CollectionReconciler<'a> {
    pub fn new(library: &'a dyn MediaLibrary, collection_name: impl Into<String>) -> Self {
        Self {
            library,
            collection_name: collection_name.into(),
            dry_run: false,
        }
    }

    /// Fetch and diff only, no mutating calls
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Remove what is no longer desired, add what is missing, then
    /// optionally impose the desired order.
    pub async fn reconcile(&self, desired: &[LibraryItem], reorder: bool) -> AppResult<ReconcileReport> {
        let current = self.library.collection(&self.collection_name).await?;
        let current_items = current.as_ref().map(|c| c.items.clone()).unwrap_or_default();
        let changes = diff(&current_items, desired);

        tracing::info!(
            collection = %self.collection_name,
            exists = current.is_some(),
            current = current_items.len(),
            desired = desired.len(),
            to_remove = changes.to_remove.len(),
            to_add = changes.to_add.len(),
            dry_run = self.dry_run,
            "Collection diff computed"
        );

        let mut report = ReconcileReport {
            removed: changes.to_remove.len(),
            added: changes.to_add.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };
        if self.dry_run {
            return Ok(report);
        }

        let collection = match current {
            Some(collection) => {
                if !changes.to_remove.is_empty() {
                    self.library.remove_items(&collection, &changes.to_remove).await?;
                }
                if !changes.to_add.is_empty() {
                    self.library.add_items(&collection, &changes.to_add).await?;
                }
                collection
            }
            None if !changes.to_add.is_empty() => {
                report.created = true;
                self.library
                    .create_collection(&self.collection_name, &changes.to_add)
                    .await?
            }
            None => return Ok(report),
        };

        if reorder && !desired.is_empty() {
            report.reorder = Some(self.apply_custom_order(&collection, desired).await);
        }

        Ok(report)
    }

    /// Empty the collection, add the full desired set, then reorder.
    pub async fn rebuild(&self, desired: &[LibraryItem]) -> AppResult<ReconcileReport> {
        let current = self.library.collection(&self.collection_name).await?;
        let current_items = current.as_ref().map(|c| c.items.clone()).unwrap_or_default();

        tracing::info!(
            collection = %self.collection_name,
            current = current_items.len(),
            desired = desired.len(),
            dry_run = self.dry_run,
            "Rebuilding collection"
        );

        let mut report = ReconcileReport {
            removed: current_items.len(),
            added: desired.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };
        if self.dry_run {
            return Ok(report);
        }

        let collection = match current {
            Some(collection) => {
                if !current_items.is_empty() {
                    self.library.remove_items(&collection, &current_items).await?;
                }
                if !desired.is_empty() {
                    self.library.add_items(&collection, desired).await?;
                }
                collection
            }
            None if !desired.is_empty() => {
                report.created = true;
                self.library.create_collection(&self.collection_name, desired).await?
            }
            None => return Ok(report),
        };

        if !desired.is_empty() {
            report.reorder = Some(self.apply_custom_order(&collection, desired).await);
        }

        Ok(report)
    }

    /// Walk `ordered` and chain each item after the previous successful move.
    /// Individual failures are recorded and skipped, never retried.
    pub async fn apply_custom_order(
        &self,
        collection: &CollectionState,
        ordered: &[LibraryItem],
    ) -> ReorderReport {
        let mut report = ReorderReport::default();

        if let Err(e) = self.library.set_custom_order(collection).await {
            tracing::warn!(
                collection = %self.collection_name,
                error = %e,
                "Could not switch collection to custom order, skipping reorder"
            );
            report.skipped_reason = Some(e.to_string());
            return report;
        }

        let live = match self.library.collection(&self.collection_name).await {
            Ok(Some(state)) => Some(state.keys()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify collection membership before reorder");
                None
            }
        };

        let mut anchor: Option<RatingKey> = None;
        for (index, item) in ordered.iter().enumerate() {
            report.attempted += 1;

            if let Some(live) = &live {
                if !live.contains(&item.key) {
                    tracing::warn!(key = %item.key, title = %item.title, "Skipping move, item not in collection");
                    report.failed.push(FailedMove {
                        key: item.key.clone(),
                        title: item.title.clone(),
                        reason: "not in collection".to_string(),
                    });
                    continue;
                }
            }

            match self.library.move_item(collection, &item.key, anchor.as_ref()).await {
                Ok(()) => {
                    report.moved += 1;
                    anchor = Some(item.key.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        key = %item.key,
                        title = %item.title,
                        after = ?anchor.as_ref().map(|a| a.as_str()),
                        error = %e,
                        "Move failed"
                    );
                    report.failed.push(FailedMove {
                        key: item.key.clone(),
                        title: item.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if (index + 1) % MOVE_BATCH == 0 {
                tracing::info!(done = index + 1, total = ordered.len(), "Reorder progress");
                tokio::time::sleep(MOVE_PAUSE).await;
            }
        }

        tracing::info!(
            collection = %self.collection_name,
            attempted = report.attempted,
            moved = report.moved,
            failed = report.failed.len(),
            "Reorder finished"
        );

        report
    }
}
