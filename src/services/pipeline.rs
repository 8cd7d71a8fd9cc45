//! One curation run: recommend, match against the library, acquire what is
//! missing, rescore, then converge the collection (now or deferred) and run
//! any enabled maintenance steps.

use std::collections::HashMap;
use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    config::{Config, ScoringPolicy},
    db::{CollectionSnapshot, MetadataCache, ScoreBook},
    error::AppResult,
    models::{AcquisitionOutcome, LibraryItem, MediaType, RatingKey},
    services::{
        candidates::{union_items, CandidateSetBuilder},
        maintenance::{unmonitor_present, CleanupSummary, DuplicateCleaner, UnmonitorSummary},
        providers::{
            DownloadManager, MediaLibrary, MetadataProvider, OpenAiRecommender, PlexLibrary,
            RadarrClient, Recommender, TmdbClient,
        },
        reconciler::{CollectionReconciler, ReconcileReport},
        recommendations::{get_recommendations, RecommendationSource},
        refresher::{OffPeakRefresher, RefreshSummary},
        title_search::find_movie,
    },
    telemetry::{step, RunId},
};

const LOOKUP_PROGRESS_EVERY: usize = 5;

/// Everything one invocation needs, passed explicitly into each stage
pub struct RunContext {
    pub config: Config,
    pub run_id: RunId,
    pub library: Arc<dyn MediaLibrary>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub recommender: Option<Arc<dyn Recommender>>,
    pub downloads: Arc<dyn DownloadManager>,
}

impl RunContext {
    /// Builds the HTTP clients described by `config`
    pub fn from_config(config: Config) -> AppResult<Self> {
        let library = PlexLibrary::new(
            config.plex_url.clone(),
            config.plex_token.clone(),
            config.movie_library_name.clone(),
        )?;
        let metadata = TmdbClient::new(config.tmdb_api_key.clone(), config.tmdb_api_url.clone())?;
        let recommender: Option<Arc<dyn Recommender>> = match config
            .openai_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        {
            Some(key) => Some(Arc::new(OpenAiRecommender::new(
                key.to_string(),
                config.openai_api_url.clone(),
                config.openai_model.clone(),
            )?)),
            None => None,
        };
        let downloads = RadarrClient::new(
            config.radarr_url.clone(),
            config.radarr_api_key.clone(),
            config.radarr_root_folder.clone(),
            config.radarr_quality_profile_id,
            config.radarr_tag_name.clone(),
        )?;

        Ok(Self {
            config,
            run_id: RunId::new(),
            library: Arc::new(library),
            metadata: Arc::new(metadata),
            recommender,
            downloads: Arc::new(downloads),
        })
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub seed: String,
    /// Set when the media type is not curated and nothing ran
    pub skipped: bool,
    pub recommendations: usize,
    pub source: Option<RecommendationSource>,
    pub found: usize,
    pub missing: usize,
    pub lookup_failed: usize,
    pub added: usize,
    pub monitored: usize,
    pub already_monitored: usize,
    pub acquisition_failed: usize,
    pub desired: usize,
    pub dropped: usize,
    pub pruned: usize,
    pub deferred: bool,
    pub snapshot_saved: bool,
    pub scores_saved: bool,
    pub reconcile: Option<ReconcileReport>,
    pub refresh: Option<RefreshSummary>,
    pub duplicates: Option<CleanupSummary>,
    pub unmonitor: Option<UnmonitorSummary>,
}

/// Only movies are curated
pub fn is_curatable(media_type: &str) -> bool {
    MediaType::from(media_type) == MediaType::Movie
}

pub async fn run_pipeline(ctx: &RunContext, seed: &str, media_type: &str) -> AppResult<PipelineSummary> {
    let mut rng = StdRng::from_entropy();
    run_pipeline_with_rng(ctx, seed, media_type, &mut rng).await
}

pub async fn run_pipeline_with_rng<R: Rng + Send>(
    ctx: &RunContext,
    seed: &str,
    media_type: &str,
    rng: &mut R,
) -> AppResult<PipelineSummary> {
    let config = &ctx.config;
    let mut summary = PipelineSummary {
        seed: seed.to_string(),
        deferred: config.deferred_refresh,
        ..Default::default()
    };

    if !is_curatable(media_type) {
        tracing::info!(seed = %seed, media_type = %media_type, "Skipping non-movie media");
        summary.skipped = true;
        return Ok(summary);
    }

    let mut scores = ScoreBook::load(&config.points_file);
    let mut cache = MetadataCache::load(config.tmdb_cache_file.clone(), ctx.metadata.clone());
    tracing::info!(entries = scores.len(), path = %config.points_file.display(), "Loaded scores");

    let recs = step(
        "recommend",
        get_recommendations(
            ctx.recommender.as_deref(),
            ctx.metadata.as_ref(),
            seed,
            config.recommendation_count,
            config.tmdb_recommendation_count,
        ),
    )
    .await;
    summary.recommendations = recs.titles.len();
    summary.source = Some(recs.source);

    let (found, missing) = step("library_lookup", lookup_titles(ctx, &recs.titles, &mut summary)).await;

    if !missing.is_empty() {
        step("acquire_missing", acquire_missing(ctx, &missing, &mut summary)).await;
    }

    let existing = ctx
        .library
        .collection(&config.collection_name)
        .await?
        .map(|collection| collection.items)
        .unwrap_or_default();

    let ratings = match config.scoring_policy {
        ScoringPolicy::Decay => step("ratings", collect_ratings(&mut cache, &existing, &found)).await,
        ScoringPolicy::Monotonic => HashMap::new(),
    };

    let desired = CandidateSetBuilder::new(config.scoring_policy)
        .with_cap(config.collection_cap)
        .with_ratings(ratings)
        .build(&existing, &found, &mut scores);
    summary.desired = desired.len();
    summary.dropped = desired.dropped.len();

    if config.prune_non_positive {
        summary.pruned = scores.prune_non_positive();
        if summary.pruned > 0 {
            tracing::info!(pruned = summary.pruned, "Removed entries with no points");
        }
    }

    let mut items = desired.items();
    // written in both modes; the refresher takes its membership from it
    let snapshot = CollectionSnapshot::from_items(&items, &scores);
    match snapshot.save(&config.collection_state_file) {
        Ok(()) => summary.snapshot_saved = true,
        Err(e) => {
            tracing::error!(path = %config.collection_state_file.display(), error = %e, "Failed writing collection snapshot")
        }
    }

    if config.deferred_refresh {
        tracing::info!(items = items.len(), "Collection update deferred to the refresher");
    } else {
        if config.randomize_collection && config.reorder_enabled {
            items.shuffle(rng);
        }
        let reconciler = CollectionReconciler::new(ctx.library.as_ref(), config.collection_name.clone());
        let report = step("reconcile", reconciler.reconcile(&items, config.reorder_enabled)).await?;
        summary.reconcile = Some(report);
    }

    summary.scores_saved = scores.save(&config.points_file).is_success();
    cache.save();

    if config.run_duplicate_cleaner {
        let cleaner = DuplicateCleaner::new(
            ctx.library.as_ref(),
            config.delete_preference,
            config.preserve_quality.clone(),
        )
        .dry_run(config.duplicate_cleaner_dry_run);
        match step("duplicate_cleanup", cleaner.run()).await {
            Ok(cleanup) => summary.duplicates = Some(cleanup),
            Err(e) => tracing::error!(error = %e, "Duplicate cleanup failed"),
        }
    }

    if config.run_unmonitor_present {
        let unmonitor = unmonitor_present(ctx.library.as_ref(), ctx.downloads.as_ref(), config.unmonitor_dry_run);
        match step("unmonitor_present", unmonitor).await {
            Ok(unmonitored) => summary.unmonitor = Some(unmonitored),
            Err(e) => tracing::error!(error = %e, "Unmonitor pass failed"),
        }
    }

    if config.run_refresher_after_pipeline {
        let refresher = OffPeakRefresher::new(
            ctx.library.as_ref(),
            config.points_file.clone(),
            config.collection_name.clone(),
        )
        .with_snapshot(config.collection_state_file.clone());
        match step("refresh", refresher.run_with_rng(rng)).await {
            Ok(refresh) => summary.refresh = Some(refresh),
            Err(e) => tracing::error!(error = %e, "Refresher failed after pipeline"),
        }
    }

    tracing::info!(
        seed = %summary.seed,
        recommendations = summary.recommendations,
        found = summary.found,
        missing = summary.missing,
        lookup_failed = summary.lookup_failed,
        added = summary.added,
        monitored = summary.monitored,
        already_monitored = summary.already_monitored,
        acquisition_failed = summary.acquisition_failed,
        desired = summary.desired,
        pruned = summary.pruned,
        deferred = summary.deferred,
        "Pipeline summary"
    );

    Ok(summary)
}

/// Splits titles into library matches and titles the library lacks.
/// Titles whose lookup errored are in neither list.
async fn lookup_titles(
    ctx: &RunContext,
    titles: &[String],
    summary: &mut PipelineSummary,
) -> (Vec<LibraryItem>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for (index, title) in titles.iter().enumerate() {
        match find_movie(ctx.library.as_ref(), title).await {
            Ok(Some(item)) => found.push(item),
            Ok(None) => missing.push(title.clone()),
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Library lookup failed");
                summary.lookup_failed += 1;
            }
        }

        let done = index + 1;
        if done % LOOKUP_PROGRESS_EVERY == 0 || done == titles.len() {
            tracing::info!(
                done,
                total = titles.len(),
                found = found.len(),
                missing = missing.len(),
                "Lookup progress"
            );
        }
    }

    summary.found = found.len();
    summary.missing = missing.len();
    (found, missing)
}

async fn acquire_missing(ctx: &RunContext, titles: &[String], summary: &mut PipelineSummary) {
    for title in titles {
        match ctx.downloads.request_title(title).await {
            Ok(Some(AcquisitionOutcome::Added)) => summary.added += 1,
            Ok(Some(AcquisitionOutcome::Monitored)) => summary.monitored += 1,
            Ok(Some(AcquisitionOutcome::AlreadyMonitored)) => summary.already_monitored += 1,
            Ok(None) => {
                tracing::warn!(title = %title, provider = ctx.downloads.name(), "Title not found by download manager");
                summary.acquisition_failed += 1;
            }
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Download request failed");
                summary.acquisition_failed += 1;
            }
        }
    }
}

/// Ratings for every item that will be scored; unresolvable titles are left out
async fn collect_ratings(
    cache: &mut MetadataCache,
    existing: &[LibraryItem],
    found: &[LibraryItem],
) -> HashMap<RatingKey, f64> {
    let mut ratings = HashMap::new();
    for item in union_items(existing, found) {
        if let Some(rating) = cache.rating_for_title(&item.title).await {
            ratings.insert(item.key, rating);
        }
    }
    ratings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{LibraryMovie, ManagedMovie, MediaCopy};
    use crate::services::providers::{
        memory::{InMemoryLibrary, LibraryCall},
        MockDownloadManager, MockMetadataProvider, MockRecommender,
    };
    use crate::services::refresher::MembershipSource;
    use mockall::predicate::eq;
    use std::path::Path;
    use tempfile::TempDir;

    const NAME: &str = "Curated";

    fn config(dir: &Path, extra: &[(&str, &str)]) -> Config {
        let mut pairs: Vec<(String, String)> = vec![
            ("CURATOR_PLEX_TOKEN", "token"),
            ("CURATOR_TMDB_API_KEY", "tmdb"),
            ("CURATOR_RADARR_API_KEY", "radarr"),
            ("CURATOR_RADARR_ROOT_FOLDER", "/movies"),
            ("CURATOR_COLLECTION_NAME", NAME),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (name, file) in [
            ("CURATOR_POINTS_FILE", "points.json"),
            ("CURATOR_TMDB_CACHE_FILE", "cache.json"),
            ("CURATOR_COLLECTION_STATE_FILE", "state.json"),
        ] {
            pairs.push((name.to_string(), dir.join(file).display().to_string()));
        }
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Config::from_pairs(pairs).unwrap()
    }

    fn recommender(titles: &[&str]) -> MockRecommender {
        let titles: Vec<String> = titles.iter().map(|t| t.to_string()).collect();
        let mut recommender = MockRecommender::new();
        recommender.expect_name().return_const("mock-llm");
        recommender
            .expect_recommend()
            .returning(move |_, _| Ok(titles.clone()));
        recommender
    }

    fn metadata() -> MockMetadataProvider {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_name().return_const("mock-metadata");
        metadata
    }

    fn context(
        config: Config,
        library: Arc<InMemoryLibrary>,
        metadata: MockMetadataProvider,
        recommender: MockRecommender,
        downloads: MockDownloadManager,
    ) -> RunContext {
        RunContext {
            config,
            run_id: RunId::new(),
            library,
            metadata: Arc::new(metadata),
            recommender: Some(Arc::new(recommender)),
            downloads: Arc::new(downloads),
        }
    }

    #[test]
    fn test_only_movies_are_curatable() {
        assert!(is_curatable("movie"));
        assert!(!is_curatable("episode"));
        assert!(!is_curatable("track"));
    }

    #[tokio::test]
    async fn test_non_movie_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(InMemoryLibrary::new());
        let ctx = RunContext {
            config: config(dir.path(), &[]),
            run_id: RunId::new(),
            library: library.clone(),
            metadata: Arc::new(MockMetadataProvider::new()),
            recommender: Some(Arc::new(MockRecommender::new())),
            downloads: Arc::new(MockDownloadManager::new()),
        };

        let summary = run_pipeline(&ctx, "Fargo", "episode").await.unwrap();

        assert!(summary.skipped);
        assert!(!dir.path().join("points.json").exists());
        assert_eq!(library.mutations(), 0);
    }

    #[tokio::test]
    async fn test_deferred_run_scores_and_snapshots_without_touching_collection() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(
            InMemoryLibrary::new()
                .with_items(&[
                    LibraryItem::movie("1", "Heat", Some(1995)),
                    LibraryItem::movie("2", "Thief", Some(1981)),
                ])
                .with_collection(NAME, &[LibraryItem::movie("9", "Alien", Some(1979))]),
        );
        let mut downloads = MockDownloadManager::new();
        downloads.expect_name().return_const("mock-radarr");
        downloads
            .expect_request_title()
            .with(eq("Ronin"))
            .times(1)
            .returning(|_| Ok(Some(AcquisitionOutcome::Added)));

        let ctx = context(
            config(dir.path(), &[]),
            library.clone(),
            metadata(),
            recommender(&["Heat (1995)", "Thief", "Ronin"]),
            downloads,
        );

        let summary = run_pipeline(&ctx, "Collateral", "movie").await.unwrap();

        assert_eq!(summary.recommendations, 3);
        assert_eq!(summary.source, Some(RecommendationSource::LanguageModel));
        assert_eq!((summary.found, summary.missing, summary.added), (2, 1, 1));
        assert_eq!(summary.desired, 3);
        assert_eq!(summary.pruned, 1);
        assert!(summary.deferred && summary.snapshot_saved && summary.scores_saved);
        assert_eq!(library.mutations(), 0);

        let scores = ScoreBook::load(&dir.path().join("points.json"));
        assert_eq!(scores.get_points(&"1".into()), 1);
        assert_eq!(scores.get_points(&"2".into()), 1);
        assert!(!scores.contains(&"9".into()));

        let snapshot = CollectionSnapshot::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert!(dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_immediate_run_reconciles_and_orders() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(
            InMemoryLibrary::new()
                .with_items(&[LibraryItem::movie("1", "Heat", Some(1995))])
                .with_collection(NAME, &[LibraryItem::movie("9", "Alien", Some(1979))]),
        );
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_DEFERRED_REFRESH", "false"),
                    ("CURATOR_RANDOMIZE_COLLECTION", "false"),
                    ("CURATOR_REORDER_ENABLED", "true"),
                    ("CURATOR_PRUNE_NON_POSITIVE", "false"),
                ],
            ),
            library.clone(),
            metadata(),
            recommender(&["Heat"]),
            MockDownloadManager::new(),
        );

        let summary = run_pipeline(&ctx, "Collateral", "movie").await.unwrap();

        let report = summary.reconcile.unwrap();
        assert_eq!((report.added, report.removed), (1, 0));
        assert_eq!(report.reorder.unwrap().moved, 2);
        assert_eq!(library.collection_keys(), vec![RatingKey::from("1"), RatingKey::from("9")]);
        let snapshot = CollectionSnapshot::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(snapshot.rating_keys, vec![RatingKey::from("1"), RatingKey::from("9")]);
    }

    #[tokio::test]
    async fn test_decay_policy_drops_low_rated_stale_items() {
        let dir = TempDir::new().unwrap();
        let mut seeded = ScoreBook::new();
        seeded.set_points(&"1".into(), 5);
        seeded.set_points(&"2".into(), 5);
        assert!(seeded.save(&dir.path().join("points.json")).is_success());

        let library = Arc::new(InMemoryLibrary::new().with_collection(
            NAME,
            &[LibraryItem::movie("1", "Great", None), LibraryItem::movie("2", "Meh", None)],
        ));
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_SCORING_POLICY", "decay"),
                    ("CURATOR_DEFERRED_REFRESH", "false"),
                    ("CURATOR_RANDOMIZE_COLLECTION", "false"),
                ],
            ),
            library.clone(),
            decay_metadata(),
            recommender(&[]),
            MockDownloadManager::new(),
        );

        let summary = run_pipeline(&ctx, "Seed", "movie").await.unwrap();

        assert_eq!(summary.source, Some(RecommendationSource::None));
        assert_eq!(summary.desired, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(library.collection_keys(), vec![RatingKey::from("1")]);

        let scores = ScoreBook::load(&dir.path().join("points.json"));
        assert_eq!(scores.get_points(&"1".into()), 4);
        assert_eq!(scores.get_points(&"2".into()), 4);
    }

    #[tokio::test]
    async fn test_collection_fetch_failure_aborts_before_saving() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(InMemoryLibrary::new());
        library.fail_fetch();
        let mut metadata = metadata();
        metadata.expect_similar_titles().returning(|_, _| Ok(Vec::new()));
        let ctx = context(
            config(dir.path(), &[]),
            library,
            metadata,
            recommender(&[]),
            MockDownloadManager::new(),
        );

        let result = run_pipeline(&ctx, "Seed", "movie").await;

        assert!(matches!(result, Err(AppError::ExternalApi(_))));
        assert!(!dir.path().join("points.json").exists());
    }

    #[tokio::test]
    async fn test_refresher_runs_after_deferred_pipeline() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(
            InMemoryLibrary::new()
                .with_items(&[LibraryItem::movie("1", "Heat", None), LibraryItem::movie("2", "Thief", None)]),
        );
        let ctx = context(
            config(dir.path(), &[("CURATOR_RUN_REFRESHER_AFTER_PIPELINE", "true")]),
            library.clone(),
            metadata(),
            recommender(&["Heat", "Thief"]),
            MockDownloadManager::new(),
        );

        let mut rng = StdRng::seed_from_u64(3);
        let summary = run_pipeline_with_rng(&ctx, "Seed", "movie", &mut rng).await.unwrap();

        let refresh = summary.refresh.unwrap();
        assert_eq!(refresh.resolved, 2);
        assert!(refresh.report.unwrap().created);
        let mut keys = library.collection_keys();
        keys.sort();
        assert_eq!(keys, vec![RatingKey::from("1"), RatingKey::from("2")]);
    }

    /// The model returns nothing in these runs, so the similar-titles fallback is asked too
    fn decay_metadata() -> MockMetadataProvider {
        let mut metadata = metadata();
        metadata.expect_similar_titles().returning(|_, _| Ok(Vec::new()));
        metadata
            .expect_search_movie_id()
            .returning(|title| Ok(Some(if title == "Great" { 10 } else { 20 })));
        metadata
            .expect_movie_rating()
            .returning(|id| Ok(if id == 10 { 9.0 } else { 7.0 }));
        metadata
    }

    #[tokio::test]
    async fn test_deferred_refresh_keeps_decay_filter() {
        let dir = TempDir::new().unwrap();
        let mut seeded = ScoreBook::new();
        seeded.set_points(&"1".into(), 5);
        seeded.set_points(&"2".into(), 5);
        assert!(seeded.save(&dir.path().join("points.json")).is_success());

        let library = Arc::new(InMemoryLibrary::new().with_collection(
            NAME,
            &[LibraryItem::movie("1", "Great", None), LibraryItem::movie("2", "Meh", None)],
        ));
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_SCORING_POLICY", "decay"),
                    ("CURATOR_RUN_REFRESHER_AFTER_PIPELINE", "true"),
                ],
            ),
            library.clone(),
            decay_metadata(),
            recommender(&[]),
            MockDownloadManager::new(),
        );

        let summary = run_pipeline(&ctx, "Seed", "movie").await.unwrap();

        assert_eq!((summary.desired, summary.dropped), (1, 1));
        // the dropped item still has points, it is only kept out of the collection
        let scores = ScoreBook::load(&dir.path().join("points.json"));
        assert_eq!(scores.get_points(&"2".into()), 4);

        let refresh = summary.refresh.unwrap();
        assert_eq!(refresh.source, MembershipSource::Snapshot);
        assert_eq!(refresh.total_keys, 1);
        assert_eq!(library.collection_keys(), vec![RatingKey::from("1")]);
    }

    #[tokio::test]
    async fn test_deferred_refresh_respects_cap() {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(
            InMemoryLibrary::new()
                .with_items(&[LibraryItem::movie("1", "Heat", None), LibraryItem::movie("2", "Thief", None)]),
        );
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_COLLECTION_CAP", "1"),
                    ("CURATOR_RUN_REFRESHER_AFTER_PIPELINE", "true"),
                ],
            ),
            library.clone(),
            metadata(),
            recommender(&["Heat", "Thief"]),
            MockDownloadManager::new(),
        );

        let summary = run_pipeline(&ctx, "Seed", "movie").await.unwrap();

        assert_eq!((summary.desired, summary.dropped), (1, 1));
        assert_eq!(summary.refresh.unwrap().resolved, 1);
        assert_eq!(library.collection_keys(), vec![RatingKey::from("1")]);
    }

    #[tokio::test]
    async fn test_randomize_without_reorder_keeps_ranked_order() {
        let dir = TempDir::new().unwrap();
        let items = [
            LibraryItem::movie("1", "Alpha", None),
            LibraryItem::movie("2", "Bravo", None),
            LibraryItem::movie("3", "Charlie", None),
        ];
        let library = Arc::new(InMemoryLibrary::new().with_items(&items));
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_DEFERRED_REFRESH", "false"),
                    ("CURATOR_RANDOMIZE_COLLECTION", "true"),
                    ("CURATOR_REORDER_ENABLED", "false"),
                ],
            ),
            library.clone(),
            metadata(),
            recommender(&["Charlie", "Alpha", "Bravo"]),
            MockDownloadManager::new(),
        );

        let mut rng = StdRng::seed_from_u64(11);
        run_pipeline_with_rng(&ctx, "Seed", "movie", &mut rng).await.unwrap();

        assert_eq!(rng.gen::<u64>(), StdRng::seed_from_u64(11).gen::<u64>());
        assert_eq!(
            library.calls(),
            vec![LibraryCall::Create(vec![
                RatingKey::from("1"),
                RatingKey::from("2"),
                RatingKey::from("3"),
            ])]
        );
    }

    #[tokio::test]
    async fn test_maintenance_steps_run_when_enabled() {
        let dir = TempDir::new().unwrap();
        let copy = |id: &str, size: u64| MediaCopy {
            id: id.to_string(),
            file: format!("/movies/{}.mkv", id),
            size,
            quality: "1080".to_string(),
        };
        let inventory = vec![
            LibraryMovie {
                item: LibraryItem::movie("1", "Heat", None),
                tmdb_id: Some(949),
                added_at: Some(10),
                copies: vec![copy("a", 10), copy("b", 20)],
            },
        ];
        let library = Arc::new(InMemoryLibrary::new().with_inventory(&inventory));

        let mut downloads = MockDownloadManager::new();
        downloads.expect_name().return_const("mock-radarr");
        downloads.expect_monitored_movies().returning(|| {
            Ok(vec![ManagedMovie {
                id: 3,
                title: "Heat".to_string(),
                tmdb_id: Some(949),
                monitored: true,
            }])
        });
        downloads.expect_unmonitor().times(1).returning(|_| Ok(()));

        let mut metadata = metadata();
        metadata.expect_similar_titles().returning(|_, _| Ok(Vec::new()));
        let ctx = context(
            config(
                dir.path(),
                &[
                    ("CURATOR_RUN_DUPLICATE_CLEANER", "true"),
                    ("CURATOR_DUPLICATE_CLEANER_DRY_RUN", "false"),
                    ("CURATOR_RUN_UNMONITOR_PRESENT", "true"),
                    ("CURATOR_UNMONITOR_DRY_RUN", "false"),
                ],
            ),
            library.clone(),
            metadata,
            recommender(&[]),
            downloads,
        );

        let summary = run_pipeline(&ctx, "Seed", "movie").await.unwrap();

        assert_eq!(summary.duplicates.unwrap().deleted, 1);
        assert_eq!(library.deleted_copies(), vec!["a".to_string()]);
        assert_eq!(summary.unmonitor.unwrap().unmonitored, 1);
    }
}
