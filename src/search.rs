use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::PlantSearchResult;
use crate::plant_api::{PlantApiError, PlantSearchProvider};
use crate::schedule::{dedupe_by_display_name, Named, UNKNOWN_NAME};

pub const MAX_SUGGESTIONS: usize = 8;

pub const POPULAR_QUERIES: &[&str] = &[
    "Monstera",
    "Snake Plant",
    "Spider Plant",
    "ZZ Plant",
    "Peace Lily",
    "Pothos",
    "Aloe Vera",
    "Fiddle Leaf Fig",
    "Rubber Plant",
    "Philodendron",
];

#[derive(Debug, PartialEq)]
pub enum SearchOutcome<T = Vec<PlantSearchResult>> {
    Applied(T),
    /// A newer query was submitted before this one finished.
    Superseded,
}

/// Runs searches where only the latest submitted query may deliver results.
pub struct SearchSession {
    provider: Arc<dyn PlantSearchProvider>,
    root: CancellationToken,
    current: Arc<Mutex<CancellationToken>>,
}

impl SearchSession {
    pub fn new(provider: Arc<dyn PlantSearchProvider>) -> Self {
        let root = CancellationToken::new();
        let current = Arc::new(Mutex::new(root.child_token()));
        Self { provider, root, current }
    }

    /// Supersedes whatever query is in flight as soon as this is called,
    /// not when the returned future is first polled. `apply` runs under the
    /// session lock, so no newer query can be submitted between the
    /// staleness check and delivery.
    pub fn submit_with<T, F>(&self, query: &str, apply: F) -> impl Future<Output = SearchOutcome<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Result<Vec<PlantSearchResult>, PlantApiError>) -> T + Send + 'static,
    {
        let token = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.cancel();
            *current = self.root.child_token();
            current.clone()
        };
        let current = Arc::clone(&self.current);
        let provider = Arc::clone(&self.provider);
        let query = query.to_string();

        async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(query = %query, "search superseded while in flight");
                    return SearchOutcome::Superseded;
                }
                result = provider.search(&query) => result,
            };

            let _live = current.lock().unwrap_or_else(|e| e.into_inner());
            if token.is_cancelled() {
                debug!(query = %query, "search superseded before delivery");
                return SearchOutcome::Superseded;
            }
            SearchOutcome::Applied(apply(result))
        }
    }

    /// Cancels every outstanding query for good.
    pub fn close(&self) {
        let _live = self.current.lock().unwrap_or_else(|e| e.into_inner());
        self.root.cancel();
    }
}

/// Display names for a type-ahead list: deduplicated, named, at most eight.
pub async fn suggest(provider: &dyn PlantSearchProvider, query: &str) -> Result<Vec<String>, PlantApiError> {
    let results = provider.search(query).await?;
    Ok(dedupe_by_display_name(results)
        .iter()
        .map(|r| r.display_name())
        .filter(|name| *name != UNKNOWN_NAME)
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect())
}

/// Top hit for each popular houseplant, fetched one at a time.
pub async fn load_popular(provider: &dyn PlantSearchProvider) -> Result<Vec<PlantSearchResult>, PlantApiError> {
    let mut popular = Vec::with_capacity(POPULAR_QUERIES.len());
    for query in POPULAR_QUERIES {
        if let Some(first) = provider.search(query).await?.into_iter().next() {
            popular.push(first);
        }
    }
    Ok(popular)
}
