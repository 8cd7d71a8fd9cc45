//! Off-peak teardown and rebuild of the curated collection.
//!
//! Membership comes from the snapshot the last curation run wrote, so the
//! decay filter and the size cap carry over. Without a readable snapshot the
//! score file's key set is taken as the complete membership. Keys are
//! shuffled, resolved against the live library, and the collection is
//! rebuilt in that order.

use std::path::PathBuf;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    db::{CollectionSnapshot, ScoreBook},
    error::{AppError, AppResult},
    models::{LibraryItem, MediaType, RatingKey},
    services::{
        providers::MediaLibrary,
        reconciler::{CollectionReconciler, ReconcileReport},
    },
};

const PROGRESS_EVERY: usize = 100;

/// Where the refresher read the collection membership from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MembershipSource {
    #[default]
    Scores,
    Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshSummary {
    pub source: MembershipSource,
    pub total_keys: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub skipped_non_movie: usize,
    pub dry_run: bool,
    /// `None` when there was nothing to apply
    pub report: Option<ReconcileReport>,
}

pub struct OffPeakRefresher<'a> {
    library: &'a dyn MediaLibrary,
    points_file: PathBuf,
    snapshot_file: Option<PathBuf>,
    collection_name: String,
    dry_run: bool,
}

impl<'a> OffPeakRefresher<'a> {
    pub fn new(
        library: &'a dyn MediaLibrary,
        points_file: impl Into<PathBuf>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            library,
            points_file: points_file.into(),
            snapshot_file: None,
            collection_name: collection_name.into(),
            dry_run: false,
        }
    }

    /// Prefer the desired set recorded by the last curation run
    pub fn with_snapshot(mut self, snapshot_file: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(snapshot_file.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> AppResult<RefreshSummary> {
        let mut rng = StdRng::from_entropy();
        self.run_with_rng(&mut rng).await
    }

    /// Snapshot keys when a snapshot is readable, otherwise every scored key
    fn membership(&self) -> AppResult<(Vec<RatingKey>, MembershipSource)> {
        if let Some(snapshot) = self.snapshot_file.as_deref().and_then(CollectionSnapshot::load) {
            return Ok((snapshot.rating_keys, MembershipSource::Snapshot));
        }

        if !self.points_file.exists() {
            return Err(AppError::MissingInput(format!(
                "points file {} does not exist",
                self.points_file.display()
            )));
        }
        Ok((ScoreBook::load(&self.points_file).keys(), MembershipSource::Scores))
    }

    pub async fn run_with_rng<R: Rng + Send>(&self, rng: &mut R) -> AppResult<RefreshSummary> {
        let (mut keys, source) = self.membership()?;
        let mut summary = RefreshSummary {
            source,
            total_keys: keys.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        if keys.is_empty() {
            tracing::warn!(source = ?source, "No collection members found, nothing to do");
            return Ok(summary);
        }

        keys.shuffle(rng);
        tracing::info!(count = keys.len(), source = ?source, "Loaded and shuffled membership keys");

        let mut items: Vec<LibraryItem> = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            match self.library.fetch_item(key).await {
                Ok(Some(item)) if item.media_type == MediaType::Movie => items.push(item),
                Ok(Some(item)) => {
                    tracing::debug!(key = %key, title = %item.title, kind = %item.media_type, "Skipping non-movie item");
                    summary.skipped_non_movie += 1;
                }
                Ok(None) => {
                    tracing::debug!(key = %key, "Key no longer resolves");
                    summary.unresolved += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to resolve key");
                    summary.unresolved += 1;
                }
            }

            let done = index + 1;
            if done % PROGRESS_EVERY == 0 || done == keys.len() {
                tracing::info!(
                    done,
                    total = keys.len(),
                    found = items.len(),
                    unresolved = summary.unresolved,
                    non_movie = summary.skipped_non_movie,
                    "Resolve progress"
                );
            }
        }
        summary.resolved = items.len();

        if items.is_empty() {
            tracing::warn!("No valid items found in the library, nothing to do");
            return Ok(summary);
        }

        for (position, item) in items.iter().take(10).enumerate() {
            tracing::debug!(position = position + 1, item = %item.display_name(), "Refresh order preview");
        }

        let report = CollectionReconciler::new(self.library, self.collection_name.clone())
            .dry_run(self.dry_run)
            .rebuild(&items)
            .await?;
        summary.report = Some(report);

        tracing::info!(
            total_keys = summary.total_keys,
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            skipped_non_movie = summary.skipped_non_movie,
            dry_run = summary.dry_run,
            "Refresh finished"
        );

        Ok(summary)
    }
}
