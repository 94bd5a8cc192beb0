//! Best-effort asset warm-up for the story shown after the current one.
//!
//! The slide only ever asks an `AssetCache` to prefetch a locator and never
//! looks at the outcome. `HttpAssetCache` is the cache used by the host binary:
//! it downloads assets into memory on a background task and swallows every
//! failure, so neither the slide state nor the caller is affected by a bad
//! locator or a network error. Prefetch only knows the locator, so per-story
//! request headers are sent by the media loader alone.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use log::{debug, trace, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as ReqwestClient;
use url::Url;

use super::errors::MediaError;

/// Asset cache collaborator. `prefetch` must return immediately.
pub trait AssetCache: Send + Sync {
    fn prefetch(&self, locator: &str);
}

/// Dispatch boundary between the slide controller and the asset cache.
#[derive(Clone)]
pub struct Prefetcher {
    cache: Arc<dyn AssetCache>,
}

impl Prefetcher {
    pub fn new(cache: Arc<dyn AssetCache>) -> Self {
        Self { cache }
    }

    pub fn dispatch(&self, locator: &str) {
        trace!("Dispatching prefetch for: {}", locator);
        self.cache.prefetch(locator);
    }
}

/// Warm assets are evicted oldest first beyond this many entries.
pub const MAX_WARM_ENTRIES: usize = 8;

#[derive(Debug, Default)]
struct WarmEntries {
    bytes: HashMap<String, Arc<Vec<u8>>>,
    order: VecDeque<String>,
}

impl WarmEntries {
    fn insert(&mut self, locator: &str, bytes: Arc<Vec<u8>>) {
        if self.bytes.insert(locator.to_string(), bytes).is_some() {
            self.order.retain(|l| l != locator);
        }
        self.order.push_back(locator.to_string());
        while self.order.len() > MAX_WARM_ENTRIES {
            if let Some(oldest) = self.order.pop_front() {
                trace!("Evicting warm asset: {}", oldest);
                self.bytes.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, locator: &str) -> Option<Arc<Vec<u8>>> {
        let bytes = self.bytes.remove(locator)?;
        self.order.retain(|l| l != locator);
        Some(bytes)
    }
}

/// In-memory cache of downloaded assets, keyed by locator.
#[derive(Clone, Debug)]
pub struct HttpAssetCache {
    client: ReqwestClient,
    warm: Arc<Mutex<WarmEntries>>,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl HttpAssetCache {
    /// Creates a cache whose downloads give up after `timeout`.
    #[must_use = "building the HTTP client can fail; the Result must be handled"]
    pub fn new(timeout: Duration) -> Result<Self, MediaError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        debug!("Initializing new HttpAssetCache.");
        Self {
            client,
            warm: Arc::new(Mutex::new(WarmEntries::default())),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }

    /// Returns the warmed bytes for `locator`, if present, leaving them cached.
    pub fn cached(&self, locator: &str) -> Option<Arc<Vec<u8>>> {
        self.warm.lock().ok().and_then(|warm| warm.bytes.get(locator).cloned())
    }

    /// Removes and returns the warmed bytes for `locator`.
    pub fn take(&self, locator: &str) -> Option<Arc<Vec<u8>>> {
        self.warm.lock().ok().and_then(|mut warm| warm.remove(locator))
    }

    pub fn warm_len(&self) -> usize {
        self.warm.lock().map(|warm| warm.bytes.len()).unwrap_or(0)
    }

    pub fn is_pending(&self, locator: &str) -> bool {
        self.pending.lock().map(|pending| pending.contains(locator)).unwrap_or(false)
    }

    pub fn store(&self, locator: &str, bytes: Arc<Vec<u8>>) {
        if let Ok(mut warm) = self.warm.lock() {
            trace!("Caching {} byte(s) for: {}", bytes.len(), locator);
            warm.insert(locator, bytes);
        }
    }

    /// Drops every warm asset and forgets pending downloads.
    /// A download already in flight may still land afterwards.
    pub fn clear(&self) {
        if let Ok(mut warm) = self.warm.lock() {
            if !warm.bytes.is_empty() {
                debug!("Clearing {} warm asset(s).", warm.bytes.len());
            }
            warm.bytes.clear();
            warm.order.clear();
        }
        if let Ok(mut pending) = self.pending.lock() {
            if !pending.is_empty() {
                debug!("Clearing {} pending asset(s).", pending.len());
            }
            pending.clear();
        }
    }

    /// Marks `locator` as pending. Returns false when it is already warm or pending.
    fn begin(&self, locator: &str) -> bool {
        if self.cached(locator).is_some() {
            return false;
        }
        match self.pending.lock() {
            Ok(mut pending) => pending.insert(locator.to_string()),
            Err(_) => false,
        }
    }

    fn finish(&self, locator: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(locator);
        }
    }
}

/// Parses a locator, accepting only http and https URLs.
pub fn parse_locator(locator: &str) -> Result<Url, MediaError> {
    let url = Url::parse(locator)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MediaError::InvalidLocator(format!("unsupported scheme '{}' in {}", other, locator))),
    }
}

/// Builds request headers from a story's header table, skipping entries
/// that are not valid HTTP header names or values.
pub fn header_map(headers: Option<&HashMap<String, String>>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.into_iter().flatten() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("Skipping invalid request header '{}'.", name),
        }
    }
    map
}

/// Downloads the asset behind `url` in full.
#[must_use = "downloading an asset can fail; the Result must be handled"]
pub async fn download(client: &ReqwestClient, url: Url, headers: HeaderMap) -> Result<Vec<u8>, MediaError> {
    let response = client.get(url).headers(headers).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

impl AssetCache for HttpAssetCache {
    fn prefetch(&self, locator: &str) {
        let url = match parse_locator(locator) {
            Ok(url) => url,
            Err(e) => {
                trace!("Skipping prefetch of '{}': {}", locator, e);
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            trace!("No async runtime available, skipping prefetch of '{}'.", locator);
            return;
        };
        if !self.begin(locator) {
            trace!("Asset '{}' already warm or pending.", locator);
            return;
        }

        let cache = self.clone();
        let locator = locator.to_string();
        runtime.spawn(async move {
            match download(&cache.client, url, HeaderMap::new()).await {
                Ok(bytes) => cache.store(&locator, Arc::new(bytes)),
                Err(e) => trace!("Prefetch of '{}' failed: {}", locator, e),
            }
            cache.finish(&locator);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingCache {
        locators: Mutex<Vec<String>>,
    }

    impl AssetCache for RecordingCache {
        fn prefetch(&self, locator: &str) {
            self.locators.lock().unwrap().push(locator.to_string());
        }
    }

    #[test]
    fn prefetcher_forwards_every_call() {
        let cache = Arc::new(RecordingCache::default());
        let prefetcher = Prefetcher::new(cache.clone());
        prefetcher.dispatch("https://cdn.example/a.jpg");
        prefetcher.dispatch("https://cdn.example/a.jpg");
        assert_eq!(cache.locators.lock().unwrap().len(), 2);
    }

    #[test]
    fn parse_locator_rejects_non_http() {
        assert!(parse_locator("https://cdn.example/a.jpg").is_ok());
        assert!(matches!(parse_locator("file:///etc/passwd"), Err(MediaError::InvalidLocator(_))));
        assert!(matches!(parse_locator("not a url"), Err(MediaError::InvalidLocator(_))));
    }

    #[test]
    fn invalid_locator_is_swallowed() {
        let cache = HttpAssetCache::with_client(ReqwestClient::new());
        cache.prefetch("not a url");
        assert!(!cache.is_pending("not a url"));
        assert!(cache.cached("not a url").is_none());
    }

    #[test]
    fn warm_entries_are_not_fetched_again() {
        let cache = HttpAssetCache::with_client(ReqwestClient::new());
        cache.store("https://cdn.example/a.jpg", Arc::new(vec![1, 2, 3]));
        assert!(!cache.begin("https://cdn.example/a.jpg"));
        assert_eq!(cache.cached("https://cdn.example/a.jpg").map(|b| b.len()), Some(3));
    }

    #[test]
    fn take_evicts_the_warm_entry() {
        let cache = HttpAssetCache::with_client(ReqwestClient::new());
        cache.store("https://cdn.example/a.jpg", Arc::new(vec![1, 2, 3]));
        assert_eq!(cache.take("https://cdn.example/a.jpg").map(|b| b.len()), Some(3));
        assert!(cache.take("https://cdn.example/a.jpg").is_none());
        assert_eq!(cache.warm_len(), 0);
    }

    #[test]
    fn warm_entries_are_bounded_oldest_first() {
        let cache = HttpAssetCache::with_client(ReqwestClient::new());
        for i in 0..MAX_WARM_ENTRIES + 3 {
            cache.store(&format!("https://cdn.example/{}.jpg", i), Arc::new(vec![0]));
        }
        assert_eq!(cache.warm_len(), MAX_WARM_ENTRIES);
        assert!(cache.cached("https://cdn.example/0.jpg").is_none());
        assert!(cache.cached("https://cdn.example/2.jpg").is_none());
        assert!(cache.cached("https://cdn.example/3.jpg").is_some());

        // Re-storing refreshes an entry's age.
        cache.store("https://cdn.example/3.jpg", Arc::new(vec![1]));
        cache.store("https://cdn.example/new.jpg", Arc::new(vec![2]));
        assert!(cache.cached("https://cdn.example/3.jpg").is_some());
        assert!(cache.cached("https://cdn.example/4.jpg").is_none());
        assert_eq!(cache.warm_len(), MAX_WARM_ENTRIES);
    }

    #[test]
    fn clear_drops_warm_and_pending() {
        let cache = HttpAssetCache::with_client(ReqwestClient::new());
        cache.store("https://cdn.example/a.jpg", Arc::new(vec![1]));
        assert!(cache.begin("https://cdn.example/b.jpg"));
        cache.clear();
        assert_eq!(cache.warm_len(), 0);
        assert!(!cache.is_pending("https://cdn.example/b.jpg"));
        assert!(cache.begin("https://cdn.example/a.jpg"));
    }

    #[test]
    fn header_map_skips_invalid_entries() {
        let mut headers = HashMap::new();
        headers.insert("x-token".to_string(), "secret".to_string());
        headers.insert("bad header".to_string(), "v".to_string());
        headers.insert("x-multiline".to_string(), "a\nb".to_string());
        let map = header_map(Some(&headers));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-token").and_then(|v| v.to_str().ok()), Some("secret"));
        assert!(header_map(None).is_empty());
    }

    #[tokio::test]
    async fn failed_download_is_swallowed_and_cleared() {
        let cache = HttpAssetCache::new(Duration::from_millis(500)).unwrap();
        // Nothing listens on the discard port.
        let locator = "http://127.0.0.1:9/asset.jpg";
        cache.prefetch(locator);
        assert!(cache.is_pending(locator));
        cache.prefetch(locator);

        for _ in 0..50 {
            if !cache.is_pending(locator) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!cache.is_pending(locator));
        assert!(cache.cached(locator).is_none());
    }
}
