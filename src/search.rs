// search.rs: Song search and processing-trigger collaborator client

use crate::loader::http_client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("search failed: HTTP {0}")]
    Status(u16),
    #[error("processing was not started")]
    NoRedirect,
}

/// One suggestion returned by `GET /search?q=`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchHit {
    pub result: SongResult,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SongResult {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_title: String,
    #[serde(default)]
    pub primary_artist: Artist,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
struct StartProcessingRequest<'a> {
    title: &'a str,
    artist: &'a str,
    song_id: u64,
}

#[derive(Debug, Deserialize)]
struct StartProcessingResponse {
    redirect_url: Option<String>,
}

/// Client for the song-search collaborator.
#[derive(Debug, Clone)]
pub struct SearchClient {
    api_base: String,
}

impl SearchClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { api_base }
    }

    /// Fetch suggestions for a query. An empty query returns no hits
    /// without touching the network.
    pub async fn suggest(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/search?q={}", self.api_base, urlencoding::encode(query));
        let resp = http_client().get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }
        let hits: Vec<SearchHit> = resp.json().await?;
        debug!(query, hits = hits.len(), "search suggestions fetched");
        Ok(hits)
    }

    /// Ask the collaborator to prepare a song. On success the returned
    /// locator points at the timeline it will serve, resolved against the
    /// API base when the collaborator answers with a relative URL.
    pub async fn start_processing(&self, song: &SongResult) -> Result<String, SearchError> {
        let url = format!("{}/start_processing", self.api_base);
        let request = StartProcessingRequest {
            title: &song.title,
            artist: &song.primary_artist.name,
            song_id: song.id,
        };
        let resp = http_client().post(&url).json(&request).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }
        let body: StartProcessingResponse = resp.json().await?;
        match body.redirect_url {
            Some(redirect) if !redirect.is_empty() => Ok(self.resolve(&redirect)),
            _ => Err(SearchError::NoRedirect),
        }
    }

    /// Resolve a collaborator URL, which may be absolute or server-relative.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.api_base, url.trim_start_matches('/'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_search_hit() {
        let raw = r#"[{
            "result": {
                "id": 378195,
                "title": "Clarity",
                "full_title": "Clarity by Zedd (Ft. Foxes)",
                "primary_artist": { "name": "Zedd" },
                "song_art_image_thumbnail_url": "https://images.example/378195.jpg"
            }
        }]"#;
        let hits: Vec<SearchHit> = serde_json::from_str(raw).expect("hit fixture parses");
        assert_eq!(hits.len(), 1);
        let song = &hits[0].result;
        assert_eq!(song.id, 378195);
        assert_eq!(song.full_title, "Clarity by Zedd (Ft. Foxes)");
        assert_eq!(song.primary_artist.name, "Zedd");
    }

    #[test]
    fn tolerates_sparse_hits() {
        let raw = r#"[{"result": {"id": 7}}]"#;
        let hits: Vec<SearchHit> = serde_json::from_str(raw).expect("sparse hit parses");
        assert_eq!(hits[0].result.title, "");
        assert_eq!(hits[0].result.primary_artist.name, "");
    }

    #[test]
    fn request_body_uses_collaborator_field_names() {
        let request = StartProcessingRequest {
            title: "Clarity",
            artist: "Zedd",
            song_id: 378195,
        };
        let value = serde_json::to_value(&request).expect("request serializes");
        assert_eq!(value["title"], "Clarity");
        assert_eq!(value["artist"], "Zedd");
        assert_eq!(value["song_id"], 378195);
    }

    #[test]
    fn resolves_relative_redirects_against_the_api_base() {
        let client = SearchClient::new("http://127.0.0.1:5000/");
        assert_eq!(
            client.resolve("/get_lyrics/7/lyrics.json"),
            "http://127.0.0.1:5000/get_lyrics/7/lyrics.json"
        );
        assert_eq!(
            client.resolve("get_lyrics/7/lyrics.json"),
            "http://127.0.0.1:5000/get_lyrics/7/lyrics.json"
        );
        assert_eq!(
            client.resolve("https://cdn.example/lyrics.json"),
            "https://cdn.example/lyrics.json"
        );
    }

    #[tokio::test]
    async fn empty_query_returns_no_hits_without_a_request() {
        let client = SearchClient::new("http://127.0.0.1:1");
        let hits = client.suggest("   ").await.expect("no network touched");
        assert!(hits.is_empty());
    }
}
