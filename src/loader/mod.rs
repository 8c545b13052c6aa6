//! Cache-backed resource loader with retry and fallback data.
//!
//! [`DataLoader::load`] never fails: transient failures are retried with
//! linear backoff, and once the attempt budget is spent a synthetic
//! dataset of the right shape is served instead. Results are cached per
//! exact URL for the lifetime of the loader, and concurrent callers for
//! the same URL share one in-flight load.

pub mod fallback;
pub mod transport;

pub use transport::{transport_for, FetchError, OfflineTransport, Transport};

use crate::models::RapportComplet;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Known JSON resources of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Parcelles,
    Projections,
    RepartitionGenre,
    GenreCommune,
    GenreTrimestre,
    EtatOperations,
    TopoData,
    RapportComplet,
    Unknown,
}

impl ResourceKind {
    /// Every known resource, in catalog order.
    #[allow(dead_code)] // Catalog listing
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Parcelles,
        ResourceKind::Projections,
        ResourceKind::RepartitionGenre,
        ResourceKind::GenreCommune,
        ResourceKind::GenreTrimestre,
        ResourceKind::EtatOperations,
        ResourceKind::TopoData,
        ResourceKind::RapportComplet,
    ];

    /// File name of the resource relative to the data source.
    pub fn file_name(&self) -> &'static str {
        match self {
            ResourceKind::Parcelles => "parcelles.json",
            ResourceKind::Projections => "projections.json",
            ResourceKind::RepartitionGenre => "repartitionGenre.json",
            ResourceKind::GenreCommune => "genreCommune.json",
            ResourceKind::GenreTrimestre => "genreTrimestre.json",
            ResourceKind::EtatOperations => "etatOperations.json",
            ResourceKind::TopoData => "topoData.json",
            ResourceKind::RapportComplet => "rapportComplet.json",
            ResourceKind::Unknown => "unknown.json",
        }
    }

    /// Guess the resource from its URL by matching the file name.
    pub fn from_url(url: &str) -> Self {
        let name = url
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(url)
            .to_lowercase()
            .replace(['_', '-'], "");

        // Longer names first: "repartitiongenre" contains "genre".
        if name.contains("genrecommune") {
            ResourceKind::GenreCommune
        } else if name.contains("genretrimestre") {
            ResourceKind::GenreTrimestre
        } else if name.contains("repartitiongenre") {
            ResourceKind::RepartitionGenre
        } else if name.contains("parcelle") {
            ResourceKind::Parcelles
        } else if name.contains("projection") {
            ResourceKind::Projections
        } else if name.contains("etatoperation") {
            ResourceKind::EtatOperations
        } else if name.contains("topo") {
            ResourceKind::TopoData
        } else if name.contains("rapport") {
            ResourceKind::RapportComplet
        } else {
            ResourceKind::Unknown
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name().trim_end_matches(".json"))
    }
}

/// Build the URL (or path) of a resource under a data source.
pub fn resource_url(source: &str, kind: ResourceKind) -> String {
    if source.is_empty() {
        kind.file_name().to_string()
    } else if source.ends_with('/') {
        format!("{}{}", source, kind.file_name())
    } else {
        format!("{}/{}", source, kind.file_name())
    }
}

/// Where a loaded payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    /// Fetched and parsed successfully.
    Network,
    /// Synthesized after the retry budget was exhausted.
    Fallback,
}

/// A loaded resource.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub url: String,
    pub kind: ResourceKind,
    pub data: Value,
    pub origin: DataOrigin,
}

impl LoadedResource {
    pub fn is_fallback(&self) -> bool {
        self.origin == DataOrigin::Fallback
    }

    /// Decode the payload as an array of records. Rows that do not decode
    /// are skipped; a non-array payload yields no records.
    pub fn records<T: DeserializeOwned>(&self) -> Vec<T> {
        let Some(rows) = self.data.as_array() else {
            warn!("{} is not an array, ignoring", self.url);
            return Vec::new();
        };

        rows.iter()
            .enumerate()
            .filter_map(|(i, row)| match T::deserialize(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping row {} of {}: {}", i, self.url, e);
                    None
                }
            })
            .collect()
    }

    /// Decode the payload as the named-sections report object.
    pub fn rapport(&self) -> RapportComplet {
        let Some(sections) = self.data.as_object() else {
            return RapportComplet::new();
        };

        sections
            .iter()
            .map(|(name, rows)| {
                let rows = rows.as_array().cloned().unwrap_or_default();
                (name.clone(), rows)
            })
            .collect()
    }
}

/// Retry and deadline settings for the loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Attempts per resource before falling back.
    pub max_attempts: usize,
    /// Backoff unit; attempt `n` waits `n * base_delay` before retrying.
    pub base_delay: Duration,
    /// Optional overall deadline per resource.
    pub deadline: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            deadline: None,
        }
    }
}

impl From<&crate::config::LoaderSettings> for LoaderConfig {
    fn from(settings: &crate::config::LoaderSettings) -> Self {
        Self {
            max_attempts: settings.retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            deadline: settings.deadline_seconds.map(Duration::from_secs),
        }
    }
}

type SharedLoad = Shared<BoxFuture<'static, Arc<LoadedResource>>>;

/// Resource loader owning the fetch cache.
pub struct DataLoader {
    transport: Arc<dyn Transport>,
    config: LoaderConfig,
    cache: Mutex<HashMap<String, SharedLoad>>,
}

impl DataLoader {
    pub fn new(transport: Arc<dyn Transport>, config: LoaderConfig) -> Self {
        Self {
            transport,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load a resource, from cache when possible.
    pub async fn load(&self, url: &str) -> Arc<LoadedResource> {
        let pending = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache
                .entry(url.to_string())
                .or_insert_with(|| {
                    debug!("Cache miss for {}", url);
                    load_uncached(
                        Arc::clone(&self.transport),
                        url.to_string(),
                        self.config.clone(),
                    )
                    .boxed()
                    .shared()
                })
                .clone()
        };

        pending.await
    }

    /// Whether a load for `url` has been started (finished or in flight).
    #[allow(dead_code)] // Used by tests and long-lived embedders
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(url)
    }

    /// Drop every cached entry.
    #[allow(dead_code)] // Used by tests and long-lived embedders
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

async fn load_uncached(
    transport: Arc<dyn Transport>,
    url: String,
    config: LoaderConfig,
) -> Arc<LoadedResource> {
    let kind = ResourceKind::from_url(&url);
    let attempts = fetch_with_retry(transport.as_ref(), &url, &config);

    let outcome = match config.deadline {
        Some(deadline) => tokio::time::timeout(deadline, attempts)
            .await
            .unwrap_or_else(|_| Err(FetchError::Deadline { url: url.clone() })),
        None => attempts.await,
    };

    let (data, origin) = match outcome {
        Ok(data) => {
            info!("Loaded {}", url);
            (data, DataOrigin::Network)
        }
        Err(e) => {
            warn!("Giving up on {} ({}), serving fallback data", url, e);
            (fallback::synthesize(kind), DataOrigin::Fallback)
        }
    };

    Arc::new(LoadedResource {
        url,
        kind,
        data,
        origin,
    })
}

async fn fetch_with_retry(
    transport: &dyn Transport,
    url: &str,
    config: &LoaderConfig,
) -> Result<Value, FetchError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match transport.fetch(url).await {
            Ok(body) => serde_json::from_slice::<Value>(&body).map_err(|e| FetchError::Parse {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.base_delay * attempt as u32;
                warn!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt, max_attempts, url, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParcelleRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that fails a fixed number of times, then serves `body`.
    struct MockTransport {
        calls: Arc<AtomicUsize>,
        failures: usize,
        body: &'static str,
        delay: Duration,
    }

    impl MockTransport {
        fn new(failures: usize, body: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let transport = Arc::new(Self {
                calls: Arc::clone(&calls),
                failures,
                body,
                delay: Duration::from_millis(20),
            });
            (transport, calls)
        }
    }

    impl Transport for MockTransport {
        fn fetch(&self, url: &str) -> transport::FetchFuture {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let succeed = call > self.failures;
            let body = self.body;
            let delay = self.delay;
            let url = url.to_string();

            async move {
                tokio::time::sleep(delay).await;
                if succeed {
                    Ok(body.as_bytes().to_vec())
                } else {
                    Err(FetchError::Status { url, status: 503 })
                }
            }
            .boxed()
        }
    }

    fn fast_config() -> LoaderConfig {
        LoaderConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_second_load_uses_cache() {
        let (transport, calls) = MockTransport::new(0, r#"[{"commune": "Bala"}]"#);
        let loader = DataLoader::new(transport, fast_config());

        let first = loader.load("data/parcelles.json").await;
        let second = loader.load("data/parcelles.json").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.origin, DataOrigin::Network);
        assert!(loader.is_cached("data/parcelles.json"));
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let (transport, calls) = MockTransport::new(0, "[]");
        let loader = DataLoader::new(transport, fast_config());

        let (a, b, c) = tokio::join!(
            loader.load("topoData.json"),
            loader.load("topoData.json"),
            loader.load("topoData.json")
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_distinct_urls_fetch_separately() {
        let (transport, calls) = MockTransport::new(0, "[]");
        let loader = DataLoader::new(transport, fast_config());

        loader.load("a/parcelles.json").await;
        loader.load("b/parcelles.json").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        loader.clear_cache();
        loader.load("a/parcelles.json").await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let (transport, calls) = MockTransport::new(2, r#"[{"commune": "Koar", "nicad": "Oui"}]"#);
        let loader = DataLoader::new(transport, fast_config());

        let loaded = loader.load("parcelles.json").await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(loaded.origin, DataOrigin::Network);
        let records: Vec<ParcelleRecord> = loaded.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commune, "Koar");
    }

    #[tokio::test]
    async fn test_exhausted_retries_serve_fallback() {
        let (transport, calls) = MockTransport::new(usize::MAX, "[]");
        let loader = DataLoader::new(transport, fast_config());

        let loaded = loader.load("https://example.org/data/parcelles.json").await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(loaded.is_fallback());
        let rows = loaded.data.as_array().unwrap();
        assert!(!rows.is_empty());
        for row in rows {
            let obj = row.as_object().unwrap();
            assert!(obj.contains_key("commune"));
            assert!(obj.contains_key("nicad"));
            assert!(obj.contains_key("region"));
        }
    }

    #[tokio::test]
    async fn test_invalid_json_counts_as_failure() {
        let (transport, calls) = MockTransport::new(0, "{not json");
        let loader = DataLoader::new(transport, fast_config());

        let loaded = loader.load("rapportComplet.json").await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(loaded.is_fallback());
        assert!(loaded.data.is_object());
        assert!(!loaded.rapport().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_between_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(MockTransport {
            calls: Arc::clone(&calls),
            failures: usize::MAX,
            body: "[]",
            delay: Duration::ZERO,
        });
        let loader = DataLoader::new(transport, LoaderConfig::default());

        let start = tokio::time::Instant::now();
        loader.load("projections.json").await;
        let elapsed = start.elapsed();

        // 1s after the first failure, 2s after the second, none after the last.
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_triggers_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(MockTransport {
            calls: Arc::clone(&calls),
            failures: 0,
            body: "[]",
            delay: Duration::from_secs(60),
        });
        let config = LoaderConfig {
            deadline: Some(Duration::from_secs(5)),
            ..LoaderConfig::default()
        };
        let loader = DataLoader::new(transport, config);

        let loaded = loader.load("genreCommune.json").await;

        assert!(loaded.is_fallback());
        assert_eq!(loaded.kind, ResourceKind::GenreCommune);
    }

    #[tokio::test]
    async fn test_records_skip_bad_rows() {
        let loaded = LoadedResource {
            url: "topoData.json".to_string(),
            kind: ResourceKind::TopoData,
            data: serde_json::json!([{"commune": "Bala", "champs": 3}, 42, {"commune": "Koar"}]),
            origin: DataOrigin::Network,
        };

        let records: Vec<crate::models::TopoRecord> = loaded.records();
        assert_eq!(records.len(), 2);
    }

    fn fixtures_dir() -> String {
        format!("{}/fixtures/data", env!("CARGO_MANIFEST_DIR"))
    }

    #[tokio::test]
    async fn test_loads_extracts_from_directory() {
        let loader = DataLoader::new(Arc::new(transport::FileTransport), fast_config());

        let url = resource_url(&fixtures_dir(), ResourceKind::Parcelles);
        let loaded = loader.load(&url).await;
        assert_eq!(loaded.origin, DataOrigin::Network);

        let records: Vec<ParcelleRecord> = loaded.records();
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].superficie, Some(1.8));
        assert_eq!(records[4].superficie, None);

        let url = resource_url(&fixtures_dir(), ResourceKind::TopoData);
        let topo: Vec<crate::models::TopoRecord> = loader.load(&url).await.records();
        assert_eq!(topo[1].champs, Some(8));
    }

    #[tokio::test]
    async fn test_missing_and_broken_files_fall_back() {
        let loader = DataLoader::new(Arc::new(transport::FileTransport), fast_config());

        let missing = resource_url(&fixtures_dir(), ResourceKind::EtatOperations);
        let loaded = loader.load(&missing).await;
        assert!(loaded.is_fallback());
        assert_eq!(loaded.kind, ResourceKind::EtatOperations);

        let broken = format!("{}/broken.json", fixtures_dir());
        let loaded = loader.load(&broken).await;
        assert!(loaded.is_fallback());
        assert_eq!(loaded.data, Value::Array(Vec::new()));
    }

    #[test]
    fn test_resource_kind_from_url() {
        assert_eq!(
            ResourceKind::from_url("https://x.org/data/parcelles.json"),
            ResourceKind::Parcelles
        );
        assert_eq!(
            ResourceKind::from_url("data/repartitionGenre.json"),
            ResourceKind::RepartitionGenre
        );
        assert_eq!(
            ResourceKind::from_url("genre_trimestre.json"),
            ResourceKind::GenreTrimestre
        );
        assert_eq!(
            ResourceKind::from_url("C:\\data\\topoData.json"),
            ResourceKind::TopoData
        );
        assert_eq!(ResourceKind::from_url("misc.json"), ResourceKind::Unknown);

        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_url(kind.file_name()), *kind);
        }
    }

    #[test]
    fn test_resource_url() {
        assert_eq!(
            resource_url("https://x.org/data", ResourceKind::Parcelles),
            "https://x.org/data/parcelles.json"
        );
        assert_eq!(
            resource_url("data/", ResourceKind::TopoData),
            "data/topoData.json"
        );
        assert_eq!(resource_url("", ResourceKind::Projections), "projections.json");
    }
}
