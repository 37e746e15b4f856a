//!
//! src/resolver.rs
//!
//! Resolves a (name, artist) pair to exactly one catalog track, going to the
//! metadata provider only when the catalog has no match
//!

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{CatalogError, StoreError};
use crate::fetch::MetadataProvider;
use crate::normalize::normalize;
use crate::persistent::CatalogStore;
use crate::types::Track;

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn CatalogStore>,
    provider: Arc<dyn MetadataProvider>,
}

impl Resolver {
    pub fn new(store: Arc<dyn CatalogStore>, provider: Arc<dyn MetadataProvider>) -> Self {
        Self { store, provider }
    }

    ///
    /// Primary lookup, then provider fetch, normalize, ISRC lookup and
    /// create-or-return. At most one provider call and one store write.
    ///
    /// Candidate lists with more than one record always resolve to the
    /// first record.
    ///
    #[tracing::instrument(name = "resolve", skip_all, fields(name = %name, artist = %artist_name))]
    pub async fn resolve(&self, name: &str, artist_name: &str) -> Result<Track, CatalogError> {
        if let Some(track) = self.store.get_by_key(name, artist_name).await? {
            debug!(id = %track.id, "resolve.hit");
            return Ok(track);
        }

        debug!("resolve.fetch");
        let records = self.provider.fetch_by_name_and_artist(name, artist_name).await?;
        let first = records.first()
            .ok_or_else(|| CatalogError::NotFound("Track not found".to_string()))?;

        let metadata = normalize(first).map_err(|e| {
            warn!(violations = %e, "resolve.invalid");
            CatalogError::from(e)
        })?;

        if let Some(existing) = self.store.get_by_isrc(&metadata.isrc).await? {
            debug!(id = %existing.id, isrc = %existing.isrc, "resolve.dedup");
            return Ok(existing);
        }

        match self.store.create(&metadata).await {
            Ok(track) => {
                info!(id = %track.id, isrc = %track.isrc, "resolve.created");
                Ok(track)
            }
            // lost the create race, the winner's row is what we return
            Err(StoreError::Conflict(_)) => {
                info!(isrc = %metadata.isrc, "resolve.conflict");
                self.store.get_by_isrc(&metadata.isrc).await?
                    .ok_or_else(|| CatalogError::Internal(format!(
                        "isrc {} conflicted on create but is not readable", metadata.isrc
                    )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{Barrier, Mutex};

    use crate::normalize::RawProviderRecord;
    use crate::persistent::SqliteCatalog;
    use crate::types::{TrackMetadata, TrackPatch};

    /// Provider returning canned records and counting calls
    pub struct StubProvider {
        outcome: Mutex<Option<Result<Vec<RawProviderRecord>, CatalogError>>>,
        records: Vec<RawProviderRecord>,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn returning(values: Vec<serde_json::Value>) -> Self {
            Self {
                outcome: Mutex::new(None),
                records: values.iter().map(RawProviderRecord::from_value).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        /// Fails the next call only
        pub fn failing(err: CatalogError) -> Self {
            Self {
                outcome: Mutex::new(Some(Err(err))),
                records: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        async fn fetch_by_name_and_artist(&self, _: &str, _: &str) ->
            Result<Vec<RawProviderRecord>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(outcome) = self.outcome.lock().await.take() {
                return outcome;
            }
            if self.records.is_empty() {
                return Err(CatalogError::NotFound("Track not found".into()));
            }
            Ok(self.records.clone())
        }
    }

    /// Wraps a real store. Counts creates, and can hold the first N ISRC
    /// lookups at a barrier so N resolutions all miss before any creates.
    struct InstrumentedStore {
        inner: SqliteCatalog,
        creates: AtomicUsize,
        isrc_lookups: AtomicUsize,
        gate: Option<(usize, Barrier)>,
    }

    impl InstrumentedStore {
        fn new(inner: SqliteCatalog) -> Self {
            Self { inner, creates: AtomicUsize::new(0), isrc_lookups: AtomicUsize::new(0), gate: None }
        }

        fn gated(inner: SqliteCatalog, n: usize) -> Self {
            Self { gate: Some((n, Barrier::new(n))), ..Self::new(inner) }
        }
    }

    #[async_trait]
    impl CatalogStore for InstrumentedStore {
        async fn get_by_id(&self, id: &str) -> Result<Option<Track>, StoreError> {
            self.inner.get_by_id(id).await
        }
        async fn get_by_key(&self, name: &str, artist_name: &str) ->
            Result<Option<Track>, StoreError> {
            self.inner.get_by_key(name, artist_name).await
        }
        async fn get_by_isrc(&self, isrc: &str) -> Result<Option<Track>, StoreError> {
            let found = self.inner.get_by_isrc(isrc).await;
            let seen = self.isrc_lookups.fetch_add(1, Ordering::SeqCst);
            if let Some((n, barrier)) = &self.gate {
                if seen < *n {
                    barrier.wait().await;
                }
            }
            found
        }
        async fn list(&self) -> Result<Vec<Track>, StoreError> {
            self.inner.list().await
        }
        async fn create(&self, track: &TrackMetadata) -> Result<Track, StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create(track).await
        }
        async fn update(&self, id: &str, patch: &TrackPatch) -> Result<Option<Track>, StoreError> {
            self.inner.update(id, patch).await
        }
        async fn delete(&self, id: &str) -> Result<Option<Track>, StoreError> {
            self.inner.delete(id).await
        }
    }

    pub fn ooh_la_la() -> serde_json::Value {
        json!({
            "name": "Ooh La La",
            "duration_ms": 214080,
            "isrc": "USWB10104988",
            "artists": [{ "name": "Faces" }],
            "album": { "release_date": "1973" }
        })
    }

    async fn setup(store: InstrumentedStore, provider: StubProvider) ->
        (Resolver, Arc<InstrumentedStore>, Arc<StubProvider>) {
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let resolver = Resolver::new(store.clone(), provider.clone());
        (resolver, store, provider)
    }

    async fn memory() -> SqliteCatalog {
        SqliteCatalog::init("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn fetch_and_persist() {
        let (resolver, store, provider) = setup(
            InstrumentedStore::new(memory().await),
            StubProvider::returning(vec![ooh_la_la()]),
        ).await;

        let track = resolver.resolve("Ooh La La", "Faces").await.unwrap();
        assert_eq!(track.name, "Ooh La La");
        assert_eq!(track.artist_name, "Faces");
        assert_eq!(track.duration, 214080);
        assert_eq!(track.isrc, "USWB10104988");
        assert_eq!(track.release_date, "1973");

        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let (resolver, store, provider) = setup(
            InstrumentedStore::new(memory().await),
            StubProvider::returning(vec![ooh_la_la()]),
        ).await;

        let first = resolver.resolve("Ooh La La", "Faces").await.unwrap();
        let second = resolver.resolve("Ooh La La", "Faces").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_isrc_under_other_key_returns_existing() {
        let db = memory().await;
        let existing = db.create(&TrackMetadata {
            name: "Ooh La La (2004 Remaster)".into(),
            artist_name: "Faces".into(),
            duration: 214000,
            isrc: "USWB10104988".into(),
            release_date: "1973-03-01".into(),
        }).await.unwrap();

        let (resolver, store, provider) = setup(
            InstrumentedStore::new(db),
            StubProvider::returning(vec![ooh_la_la()]),
        ).await;

        let track = resolver.resolve("ooh la la", "the faces").await.unwrap();
        // nothing overwritten
        assert_eq!(track, existing);
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multiple_artists_are_joined() {
        let mut record = ooh_la_la();
        record["artists"] = json!([{ "name": "A" }, { "name": "B" }]);
        let (resolver, _, _) = setup(
            InstrumentedStore::new(memory().await),
            StubProvider::returning(vec![record]),
        ).await;

        let track = resolver.resolve("Ooh La La", "A").await.unwrap();
        assert_eq!(track.artist_name, "A, B");
    }

    #[tokio::test]
    async fn first_candidate_wins() {
        let mut second = ooh_la_la();
        second["isrc"] = json!("GBAYE0000001");
        second["name"] = json!("Ooh La La (Live)");
        let (resolver, _, _) = setup(
            InstrumentedStore::new(memory().await),
            StubProvider::returning(vec![ooh_la_la(), second]),
        ).await;

        let track = resolver.resolve("Ooh La La", "Faces").await.unwrap();
        assert_eq!(track.isrc, "USWB10104988");
    }

    #[tokio::test]
    async fn empty_provider_result_is_not_found() {
        let (resolver, store, _) = setup(
            InstrumentedStore::new(memory().await),
            StubProvider::returning(vec![]),
        ).await;

        let err = resolver.resolve("Nothing", "Nobody").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)), "{err:?}");
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_fields_never_create() {
        let mut negative = ooh_la_la();
        negative["duration_ms"] = json!(-5);
        let mut unnamed = ooh_la_la();
        unnamed["name"] = json!("");

        for record in [negative, unnamed] {
            let (resolver, store, _) = setup(
                InstrumentedStore::new(memory().await),
                StubProvider::returning(vec![record]),
            ).await;

            let err = resolver.resolve("Ooh La La", "Faces").await.unwrap_err();
            assert!(matches!(err, CatalogError::InvalidMetadata(_)), "{err:?}");
            assert_eq!(store.creates.load(Ordering::SeqCst), 0);
            assert_eq!(store.inner.count_tracks().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn provider_failures_pass_through_classified() {
        for err in [
            CatalogError::UpstreamUnavailable("connect refused".into()),
            CatalogError::Internal("status 500".into()),
        ] {
            let code = err.code();
            let (resolver, store, _) = setup(
                InstrumentedStore::new(memory().await),
                StubProvider::failing(err),
            ).await;

            let got = resolver.resolve("Ooh La La", "Faces").await.unwrap_err();
            assert_eq!(got.code(), code);
            assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolutions_create_once() {
        const N: usize = 6;
        let (resolver, store, _) = setup(
            InstrumentedStore::gated(memory().await, N),
            StubProvider::returning(vec![ooh_la_la()]),
        ).await;

        // distinct input keys, all normalizing to the same ISRC
        let handles: Vec<_> = (0..N).map(|i| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                resolver.resolve(&format!("Ooh La La #{i}"), "Faces").await
            })
        }).collect();

        let mut tracks = Vec::new();
        for h in handles {
            tracks.push(h.await.unwrap().expect("no resolution may fail"));
        }

        assert_eq!(store.inner.count_tracks().await.unwrap(), 1);
        assert_eq!(store.creates.load(Ordering::SeqCst), N);
        assert!(tracks.iter().all(|t| *t == tracks[0]));
    }
}
