use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::PlantSearchResult;
use crate::normalize::{normalize_detail_payload, normalize_search_payload};
use crate::store::KeyValueStore;

const SEARCH_PAGE_SIZE: u32 = 24;
const THUMBNAIL_SIZE: u32 = 512;

#[derive(Debug, Error)]
pub enum PlantApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not fetch plant details")]
    Unavailable,
}

#[async_trait]
pub trait PlantSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PlantSearchResult>, PlantApiError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<PlantSearchResult>, PlantApiError>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn lookup(&self, name: &str) -> Option<String>;
}

/// Client for the Perenual species API (and compatible providers).
#[derive(Clone)]
pub struct PerenualClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PerenualClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, PlantApiError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, PlantApiError> {
        let mut request = self.client.get(format!("{}/{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let response = request.query(params).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PlantApiError::Status { status: status.as_u16(), body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PlantSearchProvider for PerenualClient {
    async fn search(&self, query: &str) -> Result<Vec<PlantSearchResult>, PlantApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let params = [
            ("q", query.to_string()),
            ("page", "1".to_string()),
            ("per_page", SEARCH_PAGE_SIZE.to_string()),
        ];
        let payload = self.fetch_json("species-list", &params).await?;
        let results = normalize_search_payload(&payload);
        debug!(query, results = results.len(), "plant search");
        Ok(results)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PlantSearchResult>, PlantApiError> {
        if id.is_empty() {
            return Ok(None);
        }

        // The details endpoint moved between API versions; try each in turn.
        let attempts = [
            ("species".to_string(), vec![("id", id.to_string())]),
            ("species-info".to_string(), vec![("id", id.to_string())]),
            (format!("species/{}", id), vec![]),
        ];
        let mut last_err = None;
        for (path, params) in attempts {
            match self.fetch_json(&path, &params).await {
                Ok(payload) => return Ok(normalize_detail_payload(&payload, id)),
                Err(e) => {
                    debug!(path = %path, error = %e, "details endpoint failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(PlantApiError::Unavailable))
    }
}

/// Thumbnail lookup through the Wikipedia `pageimages` API.
#[derive(Clone)]
pub struct WikipediaImages {
    client: Client,
    api_url: String,
}

impl WikipediaImages {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, PlantApiError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: api_url.to_string(),
        })
    }

    async fn fetch_thumbnail(&self, name: &str) -> Result<Option<String>, PlantApiError> {
        let size = THUMBNAIL_SIZE.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "pageimages"),
                ("format", "json"),
                ("piprop", "thumbnail"),
                ("pithumbsize", size.as_str()),
                ("origin", "*"),
                ("titles", name),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let data: Value = response.json().await?;
        let source = data
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .and_then(|pages| pages.values().next())
            .and_then(|page| page.pointer("/thumbnail/source"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(source)
    }
}

#[async_trait]
impl ImageProvider for WikipediaImages {
    async fn lookup(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        match self.fetch_thumbnail(name).await {
            Ok(found) => found,
            Err(e) => {
                debug!(name, error = %e, "wikipedia image lookup failed");
                None
            }
        }
    }
}

/// Remembers successful image lookups by name, case-insensitively.
pub struct CachedImageProvider<P> {
    inner: P,
    store: Arc<dyn KeyValueStore>,
}

impl<P: ImageProvider> CachedImageProvider<P> {
    pub fn new(inner: P, store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, store }
    }

    fn cache_key(name: &str) -> String {
        format!("image:{}", name.trim().to_lowercase())
    }
}

#[async_trait]
impl<P: ImageProvider> ImageProvider for CachedImageProvider<P> {
    async fn lookup(&self, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        let key = Self::cache_key(name);
        match self.store.get(&key) {
            Ok(Some(cached)) => return Some(cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "image cache read failed"),
        }

        let found = self.inner.lookup(name).await?;
        if let Err(e) = self.store.set(&key, &found) {
            warn!(error = %e, "image cache write failed");
        }
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> PerenualClient {
        PerenualClient::new(&server.uri(), key.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn search_sends_query_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/species-list"))
            .and(query_param("q", "fern"))
            .and(query_param("key", "secret"))
            .and(query_param("per_page", "24"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": 5, "common_name": "Boston Fern", "watering": "Frequent" },
                    { "id": 6, "common_name": "Bird's Nest Fern", "watering": "Average" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server, Some("secret")).search("  fern ").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].common_name.as_deref(), Some("Boston Fern"));
        assert_eq!(results[0].suggested_interval_days(), Some(2));
        assert_eq!(results[1].suggested_interval_days(), Some(5));
    }

    #[tokio::test]
    async fn blank_search_skips_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let results = client(&server, None).search("   ").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/species-list"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server, None).search("pothos").await.unwrap_err();
        match err {
            PlantApiError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn details_fall_through_to_next_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/species"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/species-info"))
            .and(query_param("id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "common_name": "Monstera", "humidity": "High" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let plant = client(&server, None).get_by_id("42").await.unwrap().unwrap();
        assert_eq!(plant.id, "42");
        assert_eq!(plant.common_name.as_deref(), Some("Monstera"));
        assert_eq!(plant.humidity.as_deref(), Some("High"));
    }

    #[tokio::test]
    async fn details_return_last_error_when_all_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, None).get_by_id("7").await.unwrap_err();
        assert!(matches!(err, PlantApiError::Status { status: 500, .. }));
        assert!(client(&server, None).get_by_id("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wikipedia_thumbnail_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("titles", "Aloe vera"))
            .and(query_param("pithumbsize", "512"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": { "1234": {
                    "title": "Aloe vera",
                    "thumbnail": { "source": "https://upload.wikimedia.org/aloe.jpg" }
                } } }
            })))
            .mount(&server)
            .await;

        let images = WikipediaImages::new(&format!("{}/w/api.php", server.uri()), Duration::from_secs(5)).unwrap();
        assert_eq!(
            images.lookup("Aloe vera").await.as_deref(),
            Some("https://upload.wikimedia.org/aloe.jpg")
        );
        assert_eq!(images.lookup("").await, None);
    }

    #[tokio::test]
    async fn wikipedia_failures_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let images = WikipediaImages::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(images.lookup("Fern").await, None);
    }

    struct CountingImages {
        calls: AtomicUsize,
        answer: Option<&'static str>,
    }

    #[async_trait]
    impl ImageProvider for CountingImages {
        async fn lookup(&self, _name: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map(str::to_string)
        }
    }

    #[tokio::test]
    async fn cache_is_case_insensitive() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let cached = CachedImageProvider::new(
            CountingImages { calls: AtomicUsize::new(0), answer: Some("https://img/pothos.png") },
            store.clone(),
        );

        assert_eq!(cached.lookup("Pothos").await.as_deref(), Some("https://img/pothos.png"));
        assert_eq!(cached.lookup(" POTHOS ").await.as_deref(), Some("https://img/pothos.png"));
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("image:pothos").unwrap().as_deref(), Some("https://img/pothos.png"));
    }

    #[tokio::test]
    async fn cache_does_not_remember_misses() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let cached = CachedImageProvider::new(CountingImages { calls: AtomicUsize::new(0), answer: None }, store);

        assert_eq!(cached.lookup("Mystery").await, None);
        assert_eq!(cached.lookup("Mystery").await, None);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
