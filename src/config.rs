use serde::Deserialize;
use std::path::PathBuf;

/// How candidate points evolve between runs
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPolicy {
    /// +1 each run an item is freshly recommended, never decays
    #[default]
    Monotonic,
    /// New items start at 10 and lose a point every run; low scorers need a high rating
    Decay,
}

/// Which copy of a duplicated movie the cleaner deletes
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePreference {
    #[default]
    SmallestFile,
    LargestFile,
    Newest,
    Oldest,
}

/// Application configuration loaded from `CURATOR_*` environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Media library (Plex) base URL
    #[serde(default = "default_plex_url")]
    pub plex_url: String,

    /// Media library access token
    pub plex_token: String,

    /// Library section holding movies
    #[serde(default = "default_movie_library_name")]
    pub movie_library_name: String,

    /// Name of the curated collection
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Shuffle the display order before the custom reorder. Only applies with
    /// `reorder_enabled`, since a plain diff update leaves the order to the library.
    #[serde(default = "default_true")]
    pub randomize_collection: bool,

    /// Apply an explicit custom order after a diff update
    #[serde(default)]
    pub reorder_enabled: bool,

    /// Language model API key; recommendations fall back to the metadata service without it
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    /// Titles requested from the language model
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Metadata service (TMDb) API key
    pub tmdb_api_key: String,

    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Titles requested from the metadata-service fallback
    #[serde(default = "default_recommendation_count")]
    pub tmdb_recommendation_count: usize,

    /// Download manager (Radarr) base URL
    #[serde(default = "default_radarr_url")]
    pub radarr_url: String,

    pub radarr_api_key: String,

    pub radarr_root_folder: String,

    /// Tag applied to movies added by this tool
    #[serde(default)]
    pub radarr_tag_name: Option<String>,

    #[serde(default = "default_quality_profile_id")]
    pub radarr_quality_profile_id: u32,

    #[serde(default = "default_points_file")]
    pub points_file: PathBuf,

    #[serde(default = "default_tmdb_cache_file")]
    pub tmdb_cache_file: PathBuf,

    #[serde(default = "default_collection_state_file")]
    pub collection_state_file: PathBuf,

    #[serde(default)]
    pub scoring_policy: ScoringPolicy,

    /// Drop score entries that reach zero after a run
    #[serde(default = "default_true")]
    pub prune_non_positive: bool,

    /// Leave the collection update to the off-peak refresher
    #[serde(default = "default_true")]
    pub deferred_refresh: bool,

    /// Run the refresher in-process once the pipeline finishes
    #[serde(default)]
    pub run_refresher_after_pipeline: bool,

    /// Optional upper bound on the desired collection size
    #[serde(default)]
    pub collection_cap: Option<usize>,

    /// Delete duplicate copies of the same movie after each run
    #[serde(default)]
    pub run_duplicate_cleaner: bool,

    #[serde(default = "default_true")]
    pub duplicate_cleaner_dry_run: bool,

    #[serde(default)]
    pub delete_preference: DeletePreference,

    /// Resolution labels (comma separated) whose copies are never deleted while another copy qualifies
    #[serde(default)]
    pub preserve_quality: Vec<String>,

    /// Unmonitor download-manager movies that are already in the library
    #[serde(default)]
    pub run_unmonitor_present: bool,

    #[serde(default = "default_true")]
    pub unmonitor_dry_run: bool,
}

fn default_plex_url() -> String {
    "http://localhost:32400".to_string()
}

fn default_movie_library_name() -> String {
    "Movies".to_string()
}

fn default_collection_name() -> String {
    "Inspired by your Immaculate Taste".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_api_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_recommendation_count() -> usize {
    50
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org".to_string()
}

fn default_radarr_url() -> String {
    "http://localhost:7878".to_string()
}

fn default_quality_profile_id() -> u32 {
    1
}

fn default_points_file() -> PathBuf {
    PathBuf::from("recommendation_points.json")
}

fn default_tmdb_cache_file() -> PathBuf {
    PathBuf::from("tmdb_cache.json")
}

fn default_collection_state_file() -> PathBuf {
    PathBuf::from("collection_state.json")
}

fn default_true() -> bool {
    true
}

const ENV_PREFIX: &str = "CURATOR_";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Load configuration from explicit key/value pairs (keys carry the `CURATOR_` prefix)
    pub fn from_pairs<I>(pairs: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(pairs)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
