/// Radarr download manager client
///
/// API Flow:
/// 1. Lookup: /api/v3/movie/lookup?term=... → TMDb id for the title
/// 2. Existing check: /api/v3/movie?tmdbId=... → already managed? force monitored
/// 3. Otherwise: /api/v3/tag (get or create) then POST /api/v3/movie with a search
/// 4. Maintenance: GET /api/v3/movie (monitored list), GET then PUT /api/v3/movie/{id} to unmonitor
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{AcquisitionOutcome, ManagedMovie},
    services::providers::DownloadManager,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrLookup {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RadarrMovie {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tmdb_id: Option<u64>,
    #[serde(default)]
    monitored: bool,
}

impl From<RadarrMovie> for ManagedMovie {
    fn from(movie: RadarrMovie) -> Self {
        ManagedMovie {
            id: movie.id,
            title: movie.title,
            tmdb_id: movie.tmdb_id.filter(|id| *id != 0),
            monitored: movie.monitored,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RadarrTag {
    id: u64,
    label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddOptions {
    search_for_movie: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddMovieRequest<'a> {
    title: &'a str,
    tmdb_id: u64,
    year: Option<i32>,
    quality_profile_id: u32,
    root_folder_path: &'a str,
    monitored: bool,
    add_options: AddOptions,
    tags: Vec<u64>,
}

#[derive(Clone)]
pub struct RadarrClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    root_folder: String,
    quality_profile_id: u32,
    tag_name: Option<String>,
}

impl RadarrClient {
    pub fn new(
        api_url: String,
        api_key: String,
        root_folder: String,
        quality_profile_id: u32,
        tag_name: Option<String>,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            root_folder,
            quality_profile_id,
            tag_name: tag_name.filter(|t| !t.trim().is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/api/v3{}", self.api_url, path))
            .header("X-Api-Key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Radarr API returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    async fn lookup(&self, title: &str) -> AppResult<Option<RadarrLookup>> {
        let results: Vec<RadarrLookup> = self
            .send(self.request(Method::GET, "/movie/lookup").query(&[("term", title)]))
            .await?
            .json()
            .await?;
        Ok(results.into_iter().next())
    }

    /// Existing Radarr movie for a TMDb id, kept as raw JSON so updates round-trip every field
    async fn find_by_tmdb_id(&self, tmdb_id: u64) -> AppResult<Option<Value>> {
        let movies: Vec<Value> = self
            .send(
                self.request(Method::GET, "/movie")
                    .query(&[("tmdbId", tmdb_id.to_string())]),
            )
            .await?
            .json()
            .await?;
        Ok(movies
            .into_iter()
            .find(|movie| movie.get("tmdbId").and_then(Value::as_u64) == Some(tmdb_id)))
    }

    async fn set_monitored(&self, mut movie: Value, monitored: bool) -> AppResult<()> {
        let id = movie
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| AppError::ExternalApi("Radarr movie missing id".to_string()))?;
        movie["monitored"] = Value::Bool(monitored);
        self.send(self.request(Method::PUT, &format!("/movie/{}", id)).json(&movie))
            .await?;
        Ok(())
    }

    async fn get_or_create_tag(&self, label: &str) -> AppResult<u64> {
        let tags: Vec<RadarrTag> = self.send(self.request(Method::GET, "/tag")).await?.json().await?;
        if let Some(tag) = tags.iter().find(|t| t.label.eq_ignore_ascii_case(label)) {
            return Ok(tag.id);
        }

        tracing::info!(tag = %label, "Creating Radarr tag");
        let created: RadarrTag = self
            .send(
                self.request(Method::POST, "/tag")
                    .json(&serde_json::json!({ "label": label })),
            )
            .await?
            .json()
            .await?;
        Ok(created.id)
    }
}

#[async_trait::async_trait]
impl DownloadManager for RadarrClient {
    async fn request_title(&self, title: &str) -> AppResult<Option<AcquisitionOutcome>> {
        let Some(found) = self.lookup(title).await? else {
            tracing::warn!(title = %title, "Radarr lookup returned no results");
            return Ok(None);
        };
        let Some(tmdb_id) = found.tmdb_id else {
            tracing::warn!(title = %title, "Radarr lookup result has no TMDb id");
            return Ok(None);
        };

        if let Some(existing) = self.find_by_tmdb_id(tmdb_id).await? {
            if existing.get("monitored").and_then(Value::as_bool) == Some(true) {
                tracing::info!(title = %title, tmdb_id = tmdb_id, "Already monitored in Radarr");
                return Ok(Some(AcquisitionOutcome::AlreadyMonitored));
            }
            tracing::info!(title = %title, tmdb_id = tmdb_id, "Already in Radarr, forcing monitored");
            self.set_monitored(existing, true).await?;
            return Ok(Some(AcquisitionOutcome::Monitored));
        }

        let tags = match &self.tag_name {
            Some(label) => vec![self.get_or_create_tag(label).await?],
            None => Vec::new(),
        };

        let display_title = if found.title.is_empty() { title } else { found.title.as_str() };
        let request = AddMovieRequest {
            title: display_title,
            tmdb_id,
            year: found.year,
            quality_profile_id: self.quality_profile_id,
            root_folder_path: &self.root_folder,
            monitored: true,
            add_options: AddOptions {
                search_for_movie: true,
            },
            tags,
        };

        self.send(self.request(Method::POST, "/movie").json(&request))
            .await?;
        tracing::info!(title = %display_title, tmdb_id = tmdb_id, "Added movie to Radarr and started search");
        Ok(Some(AcquisitionOutcome::Added))
    }

    async fn monitored_movies(&self) -> AppResult<Vec<ManagedMovie>> {
        let movies: Vec<RadarrMovie> = self.send(self.request(Method::GET, "/movie")).await?.json().await?;
        Ok(movies
            .into_iter()
            .filter(|movie| movie.monitored)
            .map(ManagedMovie::from)
            .collect())
    }

    async fn unmonitor(&self, movie: &ManagedMovie) -> AppResult<()> {
        let current: Value = self
            .send(self.request(Method::GET, &format!("/movie/{}", movie.id)))
            .await?
            .json()
            .await?;
        self.set_monitored(current, false).await?;
        tracing::info!(title = %movie.title, id = movie.id, "Unmonitored movie in Radarr");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "radarr"
    }
}
