//! Asset relocation: fetch externally-hosted images and re-host them in
//! the system's own storage, rewriting every draft reference. The draft
//! is only rewritten once every transfer has succeeded, so a failed
//! batch leaves no half-migrated references; already-uploaded orphans
//! are cleaned up out of band.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use voyage_core::storage::AssetStore;
use voyage_core::{ImportError, Result};

use crate::draft::Draft;

/// Network port for asset bytes, injected so tests can count fetches.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String>;
}

pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAssetFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

/// Which draft reference a transfer rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetSlot {
    HeroImage,
    StopImage(usize),
}

pub struct AssetRelocator {
    fetcher: Arc<dyn AssetFetcher>,
    store: Arc<dyn AssetStore>,
    internal_prefix: String,
    fetch_retries: u32,
    worker_bound: usize,
}

impl AssetRelocator {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        store: Arc<dyn AssetStore>,
        internal_prefix: impl Into<String>,
        fetch_retries: u32,
        worker_bound: usize,
    ) -> Self {
        Self {
            fetcher,
            store,
            internal_prefix: internal_prefix.into(),
            fetch_retries,
            worker_bound: worker_bound.max(1),
        }
    }

    /// Transfer every external image reference in the draft and rewrite
    /// it to the internal URL. Idempotent: references already under the
    /// internal prefix are skipped with zero fetches. Any single failure
    /// aborts the whole batch before persistence.
    pub async fn relocate(&self, draft: &mut Draft) -> Result<()> {
        let jobs = self.collect_jobs(draft);
        if jobs.is_empty() {
            debug!("No external assets to relocate");
            return Ok(());
        }
        info!("Relocating {} external asset(s)", jobs.len());

        let semaphore = Arc::new(Semaphore::new(self.worker_bound));
        let mut set: JoinSet<(AssetSlot, Result<String>)> = JoinSet::new();
        for (slot, url) in jobs {
            let fetcher = Arc::clone(&self.fetcher);
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let retries = self.fetch_retries;
            set.spawn(async move {
                // acquire only fails if the semaphore is closed; surface
                // that instead of running the transfer unbounded
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (
                            slot,
                            Err(ImportError::AssetTransfer {
                                url: url.clone(),
                                reason: format!("worker pool closed: {}", e),
                            }),
                        )
                    }
                };
                let result = transfer_one(fetcher.as_ref(), store.as_ref(), &url, retries).await;
                (slot, result)
            });
        }

        let mut rewrites: Vec<(AssetSlot, String)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (slot, result) = joined.map_err(|e| ImportError::AssetTransfer {
                url: "<worker>".to_string(),
                reason: e.to_string(),
            })?;
            match result {
                Ok(internal_url) => rewrites.push((slot, internal_url)),
                Err(e) => {
                    // abort the whole batch; orphaned uploads are acceptable
                    set.abort_all();
                    return Err(e);
                }
            }
        }

        for (slot, url) in rewrites {
            match slot {
                AssetSlot::HeroImage => draft.trip_mut().hero_image_url = Some(url),
                AssetSlot::StopImage(idx) => draft.stops_mut()[idx].image_url = Some(url),
            }
        }
        Ok(())
    }

    fn collect_jobs(&self, draft: &Draft) -> Vec<(AssetSlot, String)> {
        let mut jobs = Vec::new();
        if let Some(url) = &draft.trip().hero_image_url {
            if !self.is_internal(url) {
                jobs.push((AssetSlot::HeroImage, url.clone()));
            }
        }
        for (idx, stop) in draft.stops().iter().enumerate() {
            if let Some(url) = &stop.image_url {
                if !self.is_internal(url) {
                    jobs.push((AssetSlot::StopImage(idx), url.clone()));
                }
            }
        }
        jobs
    }

    fn is_internal(&self, url: &str) -> bool {
        url.starts_with(&self.internal_prefix)
    }
}

async fn transfer_one(
    fetcher: &dyn AssetFetcher,
    store: &dyn AssetStore,
    url: &str,
    retries: u32,
) -> Result<String> {
    let mut last_error = String::new();
    for attempt in 0..=retries {
        if attempt > 0 {
            let backoff = Duration::from_millis(200 * u64::from(attempt));
            warn!(
                "Retrying asset fetch for {} (attempt {}/{})",
                url,
                attempt + 1,
                retries + 1
            );
            tokio::time::sleep(backoff).await;
        }
        match fetcher.fetch(url).await {
            Ok(bytes) => {
                let internal = store.put(&bytes, url).await?;
                debug!("Relocated {} -> {}", url, internal);
                return Ok(internal);
            }
            Err(reason) => last_error = reason,
        }
    }
    Err(ImportError::AssetTransfer {
        url: url.to_string(),
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceDocument, SourceStop, SourceTrip};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use voyage_core::domain::VesselKind;
    use voyage_core::storage::FsAssetStore;

    struct CountingFetcher {
        calls: AtomicUsize,
        fail_urls: Vec<String>,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_urls: Vec::new(),
            }
        }

        fn failing_on(url: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_urls: vec![url.to_string()],
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AssetFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_urls.iter().any(|u| u == url) {
                return Err("connection refused".to_string());
            }
            Ok(format!("bytes of {}", url).into_bytes())
        }
    }

    fn draft_with_images(hero: Option<&str>, stop_image: Option<&str>) -> Draft {
        let doc = SourceDocument {
            trip: SourceTrip {
                name: "Test Trip".to_string(),
                slug: "test-trip".to_string(),
                operator_name: "Azure Lines".to_string(),
                vessel_name: "MV Meltemi".to_string(),
                vessel_kind: VesselKind::Ship,
                start_date: "2025-08-21".to_string(),
                end_date: "2025-08-21".to_string(),
                hero_image_url: hero.map(str::to_string),
            },
            stops: vec![SourceStop {
                day: 1,
                sea_day: false,
                location: Some("Athens".to_string()),
                country: Some("Greece".to_string()),
                region: None,
                arrival_time: None,
                departure_time: None,
                top_attractions: vec!["Acropolis".to_string()],
                venues_of_interest: vec!["Plaka".to_string()],
                image_url: stop_image.map(str::to_string),
            }],
            venues: Vec::new(),
            amenities: Vec::new(),
        };
        Draft::from_source(&doc).unwrap()
    }

    fn relocator(fetcher: Arc<CountingFetcher>, dir: &std::path::Path) -> AssetRelocator {
        AssetRelocator::new(
            fetcher,
            Arc::new(FsAssetStore::new(dir, "/assets")),
            "/assets",
            0,
            4,
        )
    }

    #[tokio::test]
    async fn external_references_are_fetched_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new());
        let mut draft = draft_with_images(
            Some("https://cdn.example.com/hero.jpg"),
            Some("https://cdn.example.com/athens.jpg"),
        );

        relocator(Arc::clone(&fetcher), dir.path())
            .relocate(&mut draft)
            .await
            .unwrap();

        assert_eq!(fetcher.call_count(), 2);
        assert!(draft
            .trip()
            .hero_image_url
            .as_deref()
            .unwrap()
            .starts_with("/assets/"));
        assert!(draft.stops()[0]
            .image_url
            .as_deref()
            .unwrap()
            .starts_with("/assets/"));
    }

    #[tokio::test]
    async fn internal_references_cause_zero_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new());
        let mut draft = draft_with_images(Some("/assets/sha256/ab/cd/abcd.jpg"), None);

        relocator(Arc::clone(&fetcher), dir.path())
            .relocate(&mut draft)
            .await
            .unwrap();

        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(
            draft.trip().hero_image_url.as_deref(),
            Some("/assets/sha256/ab/cd/abcd.jpg")
        );
    }

    #[tokio::test]
    async fn one_failing_asset_aborts_without_rewriting_anything() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::failing_on(
            "https://cdn.example.com/athens.jpg",
        ));
        let mut draft = draft_with_images(
            Some("https://cdn.example.com/hero.jpg"),
            Some("https://cdn.example.com/athens.jpg"),
        );

        let err = relocator(Arc::clone(&fetcher), dir.path())
            .relocate(&mut draft)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::AssetTransfer { .. }));
        // no reference was rewritten
        assert_eq!(
            draft.trip().hero_image_url.as_deref(),
            Some("https://cdn.example.com/hero.jpg")
        );
        assert_eq!(
            draft.stops()[0].image_url.as_deref(),
            Some("https://cdn.example.com/athens.jpg")
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        struct FlakyFetcher {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl AssetFetcher for FlakyFetcher {
            async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("timeout".to_string())
                } else {
                    Ok(format!("bytes of {}", url).into_bytes())
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(FsAssetStore::new(dir.path(), "/assets"));
        let relocator = AssetRelocator::new(fetcher, store, "/assets", 2, 4);

        let mut draft = draft_with_images(Some("https://cdn.example.com/hero.jpg"), None);
        relocator.relocate(&mut draft).await.unwrap();
        assert!(draft
            .trip()
            .hero_image_url
            .as_deref()
            .unwrap()
            .starts_with("/assets/"));
    }
}
