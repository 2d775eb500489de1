//! Offline cache for the application shell.
//!
//! Navigations are served network-first with the cached shell as the
//! offline fallback; other same-origin GETs are cache-first. Everything
//! else passes through untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// The document served for navigations when the network is down.
const SHELL_INDEX: &str = "/index.html";

/// How a request is routed between the network and the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Try the network, fall back to the cache (and finally to the shell).
    NetworkFirst,
    /// Serve from the cache, fill it from the network on a miss.
    CacheFirst,
    /// Straight to the network, never cached.
    Bypass,
}

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Network access, at its interface boundary.
#[async_trait]
pub trait ShellFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> anyhow::Result<CachedAsset>;
}

/// Route a request to its fetch strategy.
///
/// Only same-origin GETs are ever cached; mutations and cross-origin
/// traffic always hit the network.
pub fn strategy_for(method: &str, same_origin: bool, is_navigation: bool) -> FetchStrategy {
    if is_navigation {
        return FetchStrategy::NetworkFirst;
    }
    if same_origin && method.eq_ignore_ascii_case("GET") {
        return FetchStrategy::CacheFirst;
    }
    FetchStrategy::Bypass
}

/// In-memory shell asset cache in front of a [`ShellFetcher`].
pub struct ShellCache {
    fetcher: Arc<dyn ShellFetcher>,
    assets: Mutex<HashMap<String, CachedAsset>>,
}

impl ShellCache {
    pub fn new(fetcher: Arc<dyn ShellFetcher>) -> Self {
        Self {
            fetcher,
            assets: Mutex::new(HashMap::new()),
        }
    }

    /// Warm the cache with the shell assets. Individual failures are logged
    /// and skipped so one missing asset never blocks startup.
    pub async fn precache(&self, paths: &[&str]) {
        for path in paths {
            match self.fetcher.fetch(path).await {
                Ok(asset) => {
                    self.assets.lock().await.insert(path.to_string(), asset);
                }
                Err(err) => {
                    tracing::warn!(path, error = %err, "failed to precache shell asset");
                }
            }
        }
    }

    /// Serve a navigation: network first, then the cached copy of the
    /// requested path, then the cached shell document.
    pub async fn navigate(&self, path: &str) -> anyhow::Result<CachedAsset> {
        match self.fetcher.fetch(path).await {
            Ok(asset) => {
                self.assets.lock().await.insert(path.to_string(), asset.clone());
                Ok(asset)
            }
            Err(network_err) => {
                let assets = self.assets.lock().await;
                if let Some(asset) = assets.get(path).or_else(|| assets.get(SHELL_INDEX)) {
                    return Ok(asset.clone());
                }
                Err(network_err)
            }
        }
    }

    /// Serve a same-origin GET: cache first, filled from the network on a
    /// miss.
    pub async fn get(&self, path: &str) -> anyhow::Result<CachedAsset> {
        if let Some(asset) = self.assets.lock().await.get(path) {
            return Ok(asset.clone());
        }
        let asset = self.fetcher.fetch(path).await?;
        self.assets.lock().await.insert(path.to_string(), asset.clone());
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubFetcher {
        offline: AtomicBool,
        fetches: AtomicUsize,
    }

    impl StubFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                offline: AtomicBool::new(false),
                fetches: AtomicUsize::new(0),
            })
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ShellFetcher for StubFetcher {
        async fn fetch(&self, path: &str) -> anyhow::Result<CachedAsset> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                anyhow::bail!("network unreachable");
            }
            Ok(CachedAsset {
                content_type: "text/plain".to_string(),
                body: format!("live:{path}").into_bytes(),
            })
        }
    }

    #[test]
    fn navigations_are_network_first() {
        assert_eq!(strategy_for("GET", true, true), FetchStrategy::NetworkFirst);
        // A cross-origin navigation still goes network-first.
        assert_eq!(strategy_for("GET", false, true), FetchStrategy::NetworkFirst);
    }

    #[test]
    fn same_origin_gets_are_cache_first() {
        assert_eq!(strategy_for("GET", true, false), FetchStrategy::CacheFirst);
        assert_eq!(strategy_for("get", true, false), FetchStrategy::CacheFirst);
    }

    #[test]
    fn mutations_and_cross_origin_bypass_the_cache() {
        assert_eq!(strategy_for("POST", true, false), FetchStrategy::Bypass);
        assert_eq!(strategy_for("GET", false, false), FetchStrategy::Bypass);
    }

    #[tokio::test]
    async fn cache_first_fetches_once() {
        let fetcher = StubFetcher::new();
        let cache = ShellCache::new(fetcher.clone());

        let first = cache.get("/app.js").await.unwrap();
        let second = cache.get("/app.js").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn offline_navigation_falls_back_to_the_shell() {
        let fetcher = StubFetcher::new();
        let cache = ShellCache::new(fetcher.clone());
        cache.precache(&[SHELL_INDEX]).await;

        fetcher.set_offline(true);
        let asset = cache.navigate("/some/deep/route").await.unwrap();
        assert_eq!(asset.body, format!("live:{SHELL_INDEX}").into_bytes());
    }

    #[tokio::test]
    async fn offline_navigation_without_a_shell_is_an_error() {
        let fetcher = StubFetcher::new();
        let cache = ShellCache::new(fetcher.clone());

        fetcher.set_offline(true);
        assert!(cache.navigate("/some/deep/route").await.is_err());
    }

    #[tokio::test]
    async fn navigation_refreshes_the_cached_copy() {
        let fetcher = StubFetcher::new();
        let cache = ShellCache::new(fetcher.clone());

        cache.navigate("/").await.unwrap();
        fetcher.set_offline(true);
        // Served from the copy cached by the successful navigation.
        let asset = cache.navigate("/").await.unwrap();
        assert_eq!(asset.body, b"live:/".to_vec());
    }

    #[tokio::test]
    async fn precache_skips_failing_assets() {
        let fetcher = StubFetcher::new();
        let cache = ShellCache::new(fetcher.clone());

        fetcher.set_offline(true);
        cache.precache(&[SHELL_INDEX, "/app.js"]).await;
        fetcher.set_offline(false);

        // Nothing was cached; the miss goes to the network.
        cache.get("/app.js").await.unwrap();
        assert_eq!(fetcher.fetch_count(), 3);
    }
}
