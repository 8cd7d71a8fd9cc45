//! Library housekeeping that can follow a curation run.
//!
//! * Duplicate cleanup: copies of the same movie (matched on TMDb id) are
//!   found across the library and one copy per movie is deleted according to
//!   the configured [`DeletePreference`]. Copies whose resolution matches a
//!   preserved label are only deleted when every copy is preserved.
//! * Unmonitor: download-manager movies whose TMDb id is already in the
//!   library stop being monitored.
use std::collections::{BTreeMap, HashSet};

use crate::{
    config::DeletePreference,
    error::AppResult,
    models::{LibraryItem, LibraryMovie, ManagedMovie, MediaCopy},
    services::providers::{DownloadManager, MediaLibrary},
};

/// A stored copy together with the movie it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedCopy {
    pub item: LibraryItem,
    pub added_at: Option<i64>,
    pub copy: MediaCopy,
}

/// Every copy of one movie, when there is more than one
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub tmdb_id: u64,
    pub copies: Vec<OwnedCopy>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupSummary {
    pub movies: usize,
    pub groups: usize,
    /// Copies picked for deletion, applied or not
    pub selected: usize,
    pub deleted: usize,
    pub failed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnmonitorSummary {
    pub monitored: usize,
    pub in_library: usize,
    pub unmonitored: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Groups copies by TMDb id, ordered by id. Movies without an id are ignored.
pub fn find_duplicates(movies: &[LibraryMovie]) -> Vec<DuplicateGroup> {
    let mut by_id: BTreeMap<u64, Vec<OwnedCopy>> = BTreeMap::new();
    for movie in movies {
        let Some(tmdb_id) = movie.tmdb_id else {
            continue;
        };
        by_id.entry(tmdb_id).or_default().extend(movie.copies.iter().map(|copy| OwnedCopy {
            item: movie.item.clone(),
            added_at: movie.added_at,
            copy: copy.clone(),
        }));
    }

    by_id
        .into_iter()
        .filter(|(_, copies)| copies.len() > 1)
        .map(|(tmdb_id, copies)| DuplicateGroup { tmdb_id, copies })
        .collect()
}

fn is_preserved(copy: &MediaCopy, preserve: &[String]) -> bool {
    let quality = copy.quality.to_lowercase();
    preserve
        .iter()
        .map(|term| term.trim().to_lowercase())
        .any(|term| !term.is_empty() && quality.contains(&term))
}

/// The copy the preference points at, ignoring preserved copies unless all are preserved
pub fn pick_for_deletion<'g>(
    group: &'g DuplicateGroup,
    preference: DeletePreference,
    preserve: &[String],
) -> Option<&'g OwnedCopy> {
    let mut eligible: Vec<&OwnedCopy> = group
        .copies
        .iter()
        .filter(|owned| !is_preserved(&owned.copy, preserve))
        .collect();
    if eligible.is_empty() {
        eligible = group.copies.iter().collect();
    }

    let eligible = eligible.into_iter();
    match preference {
        DeletePreference::SmallestFile => eligible.min_by_key(|owned| owned.copy.size),
        DeletePreference::LargestFile => eligible.max_by_key(|owned| owned.copy.size),
        DeletePreference::Newest => eligible.max_by_key(|owned| owned.added_at),
        DeletePreference::Oldest => eligible.min_by_key(|owned| owned.added_at),
    }
}

pub struct DuplicateCleaner<'a> {
    library: &'a dyn MediaLibrary,
    preference: DeletePreference,
    preserve: Vec<String>,
    dry_run: bool,
}

impl<'a> DuplicateCleaner<'a> {
    pub fn new(library: &'a dyn MediaLibrary, preference: DeletePreference, preserve: Vec<String>) -> Self {
        Self {
            library,
            preference,
            preserve,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Deletes at most one copy per duplicated movie. Deletion failures are
    /// counted, an inventory failure is returned.
    pub async fn run(&self) -> AppResult<CleanupSummary> {
        let movies = self.library.movie_inventory().await?;
        let groups = find_duplicates(&movies);
        let mut summary = CleanupSummary {
            movies: movies.len(),
            groups: groups.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        for group in &groups {
            let Some(target) = pick_for_deletion(group, self.preference, &self.preserve) else {
                continue;
            };
            summary.selected += 1;

            for owned in &group.copies {
                tracing::debug!(
                    tmdb_id = group.tmdb_id,
                    file = %owned.copy.file,
                    quality = %owned.copy.quality,
                    size_mb = owned.copy.size / 1024 / 1024,
                    "Duplicate copy"
                );
            }

            if self.dry_run {
                tracing::info!(tmdb_id = group.tmdb_id, file = %target.copy.file, "Would delete duplicate copy");
                continue;
            }

            match self.library.delete_copy(&target.item.key, &target.copy.id).await {
                Ok(()) => {
                    tracing::info!(tmdb_id = group.tmdb_id, file = %target.copy.file, "Deleted duplicate copy");
                    summary.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(tmdb_id = group.tmdb_id, file = %target.copy.file, error = %e, "Failed deleting duplicate copy");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            movies = summary.movies,
            duplicates = summary.groups,
            selected = summary.selected,
            deleted = summary.deleted,
            failed = summary.failed,
            dry_run = summary.dry_run,
            "Duplicate cleanup finished"
        );
        Ok(summary)
    }
}

/// Stops monitoring every download-manager movie the library already holds
pub async fn unmonitor_present(
    library: &dyn MediaLibrary,
    downloads: &dyn DownloadManager,
    dry_run: bool,
) -> AppResult<UnmonitorSummary> {
    let monitored = downloads.monitored_movies().await?;
    let in_library: HashSet<u64> = library
        .movie_inventory()
        .await?
        .into_iter()
        .filter_map(|movie| movie.tmdb_id)
        .collect();

    let present: Vec<&ManagedMovie> = monitored
        .iter()
        .filter(|movie| movie.tmdb_id.is_some_and(|id| in_library.contains(&id)))
        .collect();

    let mut summary = UnmonitorSummary {
        monitored: monitored.len(),
        in_library: present.len(),
        dry_run,
        ..Default::default()
    };

    for movie in present {
        if dry_run {
            tracing::info!(title = %movie.title, tmdb_id = ?movie.tmdb_id, "Would unmonitor movie already in the library");
            continue;
        }
        match downloads.unmonitor(movie).await {
            Ok(()) => summary.unmonitored += 1,
            Err(e) => {
                tracing::error!(title = %movie.title, error = %e, provider = downloads.name(), "Failed to unmonitor movie");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        monitored = summary.monitored,
        in_library = summary.in_library,
        unmonitored = summary.unmonitored,
        failed = summary.failed,
        dry_run = summary.dry_run,
        "Unmonitor pass finished"
    );
    Ok(summary)
}
