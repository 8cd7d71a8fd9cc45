/// Plex Media Server library client
///
/// Talks to the server's JSON API directly. Every response is converted into
/// [`LibraryItem`] / [`CollectionState`] before it leaves this module.
///
/// API Flow:
/// 1. Section lookup: /library/sections → key of the movie section (resolved once)
/// 2. Search: /library/sections/{key}/all?type=1&title=...
/// 3. Collections: /library/sections/{key}/collections, then /library/collections/{id}/children
/// 4. Mutations: /library/collections (create), .../items (add/remove), .../move (reorder)
/// 5. Maintenance: /library/sections/{key}/all?includeGuids=1, DELETE /library/metadata/{key}/media/{id}
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::{
    error::{AppError, AppResult},
    models::{CollectionState, LibraryItem, LibraryMovie, MediaCopy, MediaType, RatingKey},
    services::providers::MediaLibrary,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Plex search type for movies
const MOVIE_TYPE: &str = "1";
/// `collectionSort` preference value for custom ordering
const CUSTOM_SORT: &str = "2";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexDirectory>,
    #[serde(rename = "machineIdentifier", default)]
    machine_identifier: Option<String>,
}

/// Library item as returned by Plex
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexMetadata {
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub added_at: Option<i64>,
    #[serde(rename = "Guid", default)]
    pub guids: Vec<PlexGuid>,
    #[serde(rename = "Media", default)]
    pub media: Vec<PlexMedia>,
}

/// External id such as `tmdb://603` or `imdb://tt0133093`
#[derive(Debug, Clone, Deserialize)]
pub struct PlexGuid {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexMedia {
    pub id: u64,
    #[serde(default)]
    pub video_resolution: Option<String>,
    #[serde(rename = "Part", default)]
    pub parts: Vec<PlexPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexPart {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub size: u64,
}

fn tmdb_id(guids: &[PlexGuid]) -> Option<u64> {
    guids
        .iter()
        .find(|guid| guid.id.starts_with("tmdb://"))
        .and_then(|guid| guid.id.rsplit("//").next())
        .and_then(|id| id.parse().ok())
}

impl From<PlexMetadata> for LibraryMovie {
    fn from(mut meta: PlexMetadata) -> Self {
        let tmdb_id = tmdb_id(&meta.guids);
        let added_at = meta.added_at;
        let copies = std::mem::take(&mut meta.media)
            .into_iter()
            .filter_map(|media| {
                let file = media.parts.first()?.file.clone();
                Some(MediaCopy {
                    id: media.id.to_string(),
                    file,
                    size: media.parts.iter().map(|part| part.size).sum(),
                    quality: media.video_resolution.unwrap_or_default(),
                })
            })
            .collect();

        LibraryMovie {
            item: LibraryItem::from(meta),
            tmdb_id,
            added_at,
            copies,
        }
    }
}

impl From<PlexMetadata> for LibraryItem {
    fn from(meta: PlexMetadata) -> Self {
        LibraryItem {
            key: RatingKey(meta.rating_key),
            title: meta.title,
            year: meta.year,
            media_type: MediaType::from(meta.item_type.as_str()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PlexDirectory {
    key: String,
    title: String,
}

pub struct PlexLibrary {
    http_client: HttpClient,
    base_url: String,
    token: String,
    section_name: String,
    section_key: OnceCell<String>,
    machine_id: OnceCell<String>,
}

impl PlexLibrary {
    pub fn new(base_url: String, token: String, section_name: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            section_name,
            section_key: OnceCell::new(),
            machine_id: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Plex returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    async fn container(&self, request: RequestBuilder) -> AppResult<MediaContainer> {
        let envelope: Envelope = self.send(request).await?.json().await?;
        Ok(envelope.media_container)
    }

    /// Key of the configured movie section, looked up once per client
    async fn section_key(&self) -> AppResult<&str> {
        let key = self
            .section_key
            .get_or_try_init(|| async {
                let container = self
                    .container(self.request(Method::GET, "/library/sections"))
                    .await?;
                container
                    .directory
                    .into_iter()
                    .find(|dir| dir.title.eq_ignore_ascii_case(&self.section_name))
                    .map(|dir| dir.key)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Plex library section '{}'", self.section_name))
                    })
            })
            .await?;
        Ok(key.as_str())
    }

    async fn machine_id(&self) -> AppResult<&str> {
        let id = self
            .machine_id
            .get_or_try_init(|| async {
                let container = self.container(self.request(Method::GET, "/identity")).await?;
                container.machine_identifier.ok_or_else(|| {
                    AppError::ExternalApi("Plex identity response missing machineIdentifier".to_string())
                })
            })
            .await?;
        Ok(id.as_str())
    }

    /// `server://` URI Plex expects when attaching items to a collection
    async fn items_uri(&self, items: &[LibraryItem]) -> AppResult<String> {
        let keys: Vec<&str> = items.iter().map(|item| item.key.as_str()).collect();
        Ok(format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            self.machine_id().await?,
            keys.join(",")
        ))
    }

    async fn collection_items(&self, collection_id: &str) -> AppResult<Vec<LibraryItem>> {
        let path = format!("/library/collections/{}/children", collection_id);
        let container = self.container(self.request(Method::GET, &path)).await?;
        Ok(container.metadata.into_iter().map(LibraryItem::from).collect())
    }
}

#[async_trait::async_trait]
impl MediaLibrary for PlexLibrary {
    async fn search_movies(&self, title: &str) -> AppResult<Vec<LibraryItem>> {
        if title.trim().is_empty() {
            return Err(AppError::InvalidInput("Search title cannot be empty".to_string()));
        }

        let path = format!("/library/sections/{}/all", self.section_key().await?);
        let container = self
            .container(
                self.request(Method::GET, &path)
                    .query(&[("type", MOVIE_TYPE), ("title", title)]),
            )
            .await?;

        let items: Vec<LibraryItem> = container.metadata.into_iter().map(LibraryItem::from).collect();
        tracing::debug!(title = %title, results = items.len(), provider = "plex", "Library search completed");
        Ok(items)
    }

    async fn fetch_item(&self, key: &RatingKey) -> AppResult<Option<LibraryItem>> {
        let path = format!("/library/metadata/{}", key);
        let response = self.request(Method::GET, &path).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Plex returned status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope = response.json().await?;
        Ok(envelope
            .media_container
            .metadata
            .into_iter()
            .next()
            .map(LibraryItem::from))
    }

    async fn collection(&self, name: &str) -> AppResult<Option<CollectionState>> {
        let path = format!("/library/sections/{}/collections", self.section_key().await?);
        let container = self.container(self.request(Method::GET, &path)).await?;

        let Some(found) = container
            .metadata
            .into_iter()
            .find(|meta| meta.title.trim().eq_ignore_ascii_case(name.trim()))
        else {
            return Ok(None);
        };

        let items = self.collection_items(&found.rating_key).await?;
        Ok(Some(CollectionState {
            id: found.rating_key,
            name: found.title,
            items,
        }))
    }

    async fn create_collection(&self, name: &str, items: &[LibraryItem]) -> AppResult<CollectionState> {
        if items.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Collection '{}' cannot be created without seed items",
                name
            )));
        }

        let uri = self.items_uri(items).await?;
        let section = self.section_key().await?.to_string();
        let container = self
            .container(self.request(Method::POST, "/library/collections").query(&[
                ("type", MOVIE_TYPE),
                ("title", name),
                ("smart", "0"),
                ("sectionId", section.as_str()),
                ("uri", uri.as_str()),
            ]))
            .await?;

        let created = container.metadata.into_iter().next().ok_or_else(|| {
            AppError::ExternalApi("Plex create collection response missing metadata".to_string())
        })?;

        tracing::info!(collection = %name, id = %created.rating_key, items = items.len(), "Created Plex collection");

        Ok(CollectionState {
            id: created.rating_key,
            name: name.to_string(),
            items: items.to_vec(),
        })
    }

    async fn add_items(&self, collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let uri = self.items_uri(items).await?;
        let path = format!("/library/collections/{}/items", collection.id);
        self.send(self.request(Method::PUT, &path).query(&[("uri", uri.as_str())]))
            .await?;
        Ok(())
    }

    async fn remove_items(&self, collection: &CollectionState, items: &[LibraryItem]) -> AppResult<()> {
        // Plex has no bulk removal endpoint
        for item in items {
            let path = format!("/library/collections/{}/items/{}", collection.id, item.key);
            self.send(self.request(Method::DELETE, &path)).await?;
        }
        Ok(())
    }

    async fn set_custom_order(&self, collection: &CollectionState) -> AppResult<()> {
        let path = format!("/library/metadata/{}/prefs", collection.id);
        self.send(
            self.request(Method::PUT, &path)
                .query(&[("collectionSort", CUSTOM_SORT)]),
        )
        .await?;
        Ok(())
    }

    async fn move_item(
        &self,
        collection: &CollectionState,
        item: &RatingKey,
        after: Option<&RatingKey>,
    ) -> AppResult<()> {
        let path = format!("/library/collections/{}/items/{}/move", collection.id, item);
        let mut request = self.request(Method::PUT, &path);
        if let Some(anchor) = after {
            request = request.query(&[("after", anchor.as_str())]);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn movie_inventory(&self) -> AppResult<Vec<LibraryMovie>> {
        let path = format!("/library/sections/{}/all", self.section_key().await?);
        let container = self
            .container(
                self.request(Method::GET, &path)
                    .query(&[("type", MOVIE_TYPE), ("includeGuids", "1")]),
            )
            .await?;

        let movies: Vec<LibraryMovie> = container.metadata.into_iter().map(LibraryMovie::from).collect();
        tracing::debug!(movies = movies.len(), provider = "plex", "Loaded movie inventory");
        Ok(movies)
    }

    async fn delete_copy(&self, item: &RatingKey, copy_id: &str) -> AppResult<()> {
        let path = format!("/library/metadata/{}/media/{}", item, copy_id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "plex"
    }
}
