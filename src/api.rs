use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

/// A single search result as returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub thumbnail_url: String,
  /// ISO-8601 duration code, e.g. `PT4M13S`.
  pub duration: String,
  pub channel_title: String,
  /// Decimal string; the backend forwards the catalog's raw statistic.
  pub view_count: String,
  #[serde(default)]
  pub published_at: String,
}

/// Media URL for a catalog identifier.
pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={}", video_id)
}

/// A playlist record stored by the backend. Listed for display only.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedPlaylist {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub videos: Vec<Video>,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

/// FastAPI error body: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
  detail: String,
}

/// The backend operations the app depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
  /// Search the catalog, returning at most `max_results` videos in relevance order.
  async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Video>>;

  /// List the playlists stored by the backend.
  async fn playlists(&self) -> Result<Vec<SavedPlaylist>>;
}

/// HTTP client for the muse backend (`{base}/api/...`).
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base: String,
}

impl ApiClient {
  pub fn new(base_url: &str) -> Self {
    Self { http: Client::new(), base: base_url.trim_end_matches('/').to_string() }
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/api/{}", self.base, path)
  }

  fn search_url(&self, query: &str, max_results: usize) -> Result<Url> {
    let max = max_results.to_string();
    Url::parse_with_params(&self.endpoint("search"), [("q", query), ("max_results", max.as_str())])
      .with_context(|| format!("Invalid backend URL: {}", self.base))
  }

  async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self.http.get(url.clone()).send().await.with_context(|| format!("Request to {} failed", url))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(anyhow!(error_message(status, &body)));
    }
    response.json::<T>().await.with_context(|| format!("Unexpected response shape from {}", url))
  }
}

/// Prefer the backend's `detail` over the raw body when building an error message.
fn error_message(status: StatusCode, body: &str) -> String {
  match serde_json::from_str::<ErrorBody>(body) {
    Ok(err) => format!("{}: {}", status.as_u16(), err.detail),
    Err(_) if body.trim().is_empty() => format!("Backend returned {}", status),
    Err(_) => format!("Backend returned {}: {}", status, body.trim()),
  }
}

#[async_trait]
impl Catalog for ApiClient {
  async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Video>> {
    let url = self.search_url(query, max_results)?;
    self.get_json(url).await.context("Search request failed")
  }

  async fn playlists(&self) -> Result<Vec<SavedPlaylist>> {
    let url = Url::parse(&self.endpoint("playlists")).with_context(|| format!("Invalid backend URL: {}", self.base))?;
    self.get_json(url).await.context("Playlist listing failed")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SEARCH_BODY: &str = r#"[
    {
      "id": "dQw4w9WgXcQ",
      "title": "Never Gonna Give You Up",
      "description": "The official video",
      "thumbnail_url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg",
      "duration": "PT3M33S",
      "channel_title": "Rick Astley",
      "view_count": "1500000000",
      "published_at": "2009-10-25T06:57:33Z"
    }
  ]"#;

  #[test]
  fn decodes_search_results() {
    let videos: Vec<Video> = serde_json::from_str(SEARCH_BODY).unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].id, "dQw4w9WgXcQ");
    assert_eq!(videos[0].duration, "PT3M33S");
    assert_eq!(watch_url(&videos[0].id), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
  }

  #[test]
  fn decodes_playlists_with_naive_timestamps() {
    let body = r#"[{
      "id": "8c1f", "name": "Road trip", "videos": [],
      "created_at": "2025-01-02T03:04:05.123456", "updated_at": "2025-01-02T03:04:05"
    }]"#;
    let playlists: Vec<SavedPlaylist> = serde_json::from_str(body).unwrap();
    assert_eq!(playlists[0].name, "Road trip");
    assert!(playlists[0].videos.is_empty());
    assert_eq!(playlists[0].updated_at.format("%Y-%m-%d").to_string(), "2025-01-02");
  }

  #[test]
  fn search_url_encodes_query_and_limit() {
    let client = ApiClient::new("http://localhost:8001/");
    let url = client.search_url("lofi & chill", 20).unwrap();
    assert_eq!(url.path(), "/api/search");
    let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    assert_eq!(
      pairs,
      vec![("q".to_string(), "lofi & chill".to_string()), ("max_results".to_string(), "20".to_string())]
    );
  }

  #[test]
  fn error_message_uses_detail() {
    let msg = error_message(StatusCode::TOO_MANY_REQUESTS, r#"{"detail":"YouTube API quota exceeded"}"#);
    assert_eq!(msg, "429: YouTube API quota exceeded");
  }

  #[test]
  fn error_message_falls_back_to_body() {
    let msg = error_message(StatusCode::BAD_GATEWAY, "upstream down");
    assert!(msg.contains("502"));
    assert!(msg.ends_with("upstream down"));
    assert!(error_message(StatusCode::INTERNAL_SERVER_ERROR, "").contains("500"));
  }
}
