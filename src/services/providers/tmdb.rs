/// TMDb metadata provider
///
/// Resolves titles to TMDb ids, looks up average ratings and produces the
/// fallback "similar movies" list used when no language model is available.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    services::providers::MetadataProvider,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MIN_VOTE_COUNT: u64 = 100;
const DISCOVER_MIN_VOTES: &str = "200";
/// TMDb genre id for documentaries
const DOCUMENTARY_GENRE: u64 = 99;

const RECOMMENDATIONS_BOOST: f64 = 1.0;
const SIMILAR_BOOST: f64 = 0.4;
const DISCOVER_BOOST: f64 = 0.0;

/// Movie entry in TMDb search/list responses
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PagedResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: u64,
}

#[derive(Debug, Clone)]
struct Scored {
    title: String,
    score: f64,
}

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}/3{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDb API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn search(&self, title: &str) -> AppResult<Vec<TmdbMovie>> {
        let response: PagedResponse = self.get("/search/movie", &[("query", title)]).await?;
        Ok(response.results)
    }

    async fn details(&self, id: u64) -> AppResult<MovieDetails> {
        self.get(&format!("/movie/{}", id), &[]).await
    }

    /// Follows `page` until `max_items` results or `max_pages` pages
    async fn paged(
        &self,
        path: &str,
        params: &[(&str, &str)],
        max_items: usize,
        max_pages: u32,
    ) -> AppResult<Vec<TmdbMovie>> {
        let mut out = Vec::new();
        let mut page = 1u32;

        while out.len() < max_items && page <= max_pages {
            let page_str = page.to_string();
            let mut query: Vec<(&str, &str)> = params.to_vec();
            query.push(("page", page_str.as_str()));

            let response: PagedResponse = self.get(path, &query).await?;
            if response.results.is_empty() {
                break;
            }
            out.extend(response.results);

            if page >= response.total_pages.max(1) {
                break;
            }
            page += 1;
        }

        out.truncate(max_items);
        Ok(out)
    }
}

/// Picks the search result that most plausibly is the movie the user meant
fn best_seed_result<'a>(query: &str, results: &'a [TmdbMovie]) -> Option<&'a TmdbMovie> {
    let query = query.trim().to_lowercase();

    let score = |movie: &TmdbMovie| -> f64 {
        let title = movie.title.trim().to_lowercase();
        let is_doc = movie.genre_ids.contains(&DOCUMENTARY_GENRE);
        let doc_penalty = if is_doc && !query.contains("documentary") {
            -1000.0
        } else {
            0.0
        };
        let starts = if !query.is_empty() && title.starts_with(&query) { 80.0 } else { 0.0 };
        let contains = if !query.is_empty() && title.contains(&query) { 30.0 } else { 0.0 };
        let engagement =
            movie.vote_count as f64 * 0.05 + movie.popularity * 0.5 + movie.vote_average * 2.0;
        doc_penalty + starts + contains + engagement
    };

    results
        .iter()
        .max_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal))
}

/// Adds eligible movies to `candidates`, keeping the best score per id
fn merge_candidates(
    candidates: &mut HashMap<u64, Scored>,
    seen: &mut HashSet<u64>,
    results: Vec<TmdbMovie>,
    seed_genres: &HashSet<u64>,
    boost: f64,
) {
    for movie in results {
        if seen.contains(&movie.id) || movie.title.trim().is_empty() {
            continue;
        }
        if movie.vote_count < MIN_VOTE_COUNT {
            continue;
        }
        let genres: HashSet<u64> = movie.genre_ids.iter().copied().collect();
        if !seed_genres.is_empty() && !genres.is_empty() && seed_genres.is_disjoint(&genres) {
            continue;
        }

        let candidate = Scored {
            title: movie.title.trim().to_string(),
            score: movie.vote_average + boost,
        };
        match candidates.get(&movie.id) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                candidates.insert(movie.id, candidate);
            }
        }
        seen.insert(movie.id);
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    async fn search_movie_id(&self, title: &str) -> AppResult<Option<u64>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let results = self.search(title).await?;
        Ok(results.first().map(|movie| movie.id))
    }

    async fn movie_rating(&self, id: u64) -> AppResult<f64> {
        let details = self.details(id).await?;
        Ok(details.vote_average.unwrap_or(0.0))
    }

    async fn similar_titles(&self, seed: &str, limit: usize) -> AppResult<Vec<String>> {
        let results = self.search(seed).await?;
        let Some(seed_movie) = best_seed_result(seed, &results) else {
            tracing::warn!(seed = %seed, "TMDb could not resolve seed title");
            return Ok(Vec::new());
        };
        let seed_id = seed_movie.id;

        let details = self.details(seed_id).await?;
        let genre_ids: Vec<u64> = details.genres.iter().map(|g| g.id).collect();
        let seed_genres: HashSet<u64> = genre_ids.iter().copied().collect();
        tracing::info!(seed = %seed, seed_id = seed_id, genres = ?genre_ids, limit = limit, "TMDb fallback recommendations");

        let mut seen: HashSet<u64> = HashSet::from([seed_id]);
        let mut candidates: HashMap<u64, Scored> = HashMap::new();
        let base = [("include_adult", "false")];

        let recommended = self
            .paged(&format!("/movie/{}/recommendations", seed_id), &base, limit * 2, 5)
            .await?;
        merge_candidates(&mut candidates, &mut seen, recommended, &seed_genres, RECOMMENDATIONS_BOOST);

        let similar = self
            .paged(&format!("/movie/{}/similar", seed_id), &base, limit * 2, 5)
            .await?;
        merge_candidates(&mut candidates, &mut seen, similar, &seed_genres, SIMILAR_BOOST);

        if candidates.len() < limit && !genre_ids.is_empty() {
            let with_genres = genre_ids
                .iter()
                .take(3)
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let discovered = self
                .paged(
                    "/discover/movie",
                    &[
                        ("include_adult", "false"),
                        ("with_genres", with_genres.as_str()),
                        ("vote_count.gte", DISCOVER_MIN_VOTES),
                        ("sort_by", "vote_average.desc"),
                    ],
                    limit * 3,
                    10,
                )
                .await?;
            merge_candidates(&mut candidates, &mut seen, discovered, &seed_genres, DISCOVER_BOOST);
        }

        let mut ranked: Vec<Scored> = candidates.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });

        let titles: Vec<String> = ranked.into_iter().take(limit).map(|c| c.title).collect();
        tracing::info!(seed = %seed, returned = titles.len(), provider = "tmdb", "Similar titles ranked");
        Ok(titles)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
