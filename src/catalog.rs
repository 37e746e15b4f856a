//!
//! src/catalog.rs
//!
//! The five track operations. Inputs are checked here, before anything
//! reaches the resolver or the store.
//!

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{CatalogError, StoreError};
use crate::normalize::validate_patch;
use crate::persistent::CatalogStore;
use crate::resolver::Resolver;
use crate::types::{Track, TrackPatch};

fn check_id(id: &str) -> Result<(), CatalogError> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| CatalogError::BadRequest(format!("id must be a UUID, got {id:?}")))
}

fn track_not_found(id: &str) -> CatalogError {
    CatalogError::NotFound(format!("Track {id} not found"))
}

#[derive(Clone)]
pub struct TrackCatalog {
    store: Arc<dyn CatalogStore>,
    resolver: Resolver,
}

impl TrackCatalog {
    pub fn new(store: Arc<dyn CatalogStore>, resolver: Resolver) -> Self {
        Self { store, resolver }
    }

    /// Local match or provider resolution
    pub async fn find_track(&self, name: &str, artist_name: &str) -> Result<Track, CatalogError> {
        if name.is_empty() {
            return Err(CatalogError::BadRequest("name must not be empty".to_string()));
        }
        self.resolver.resolve(name, artist_name).await
    }

    pub async fn get_track(&self, id: &str) -> Result<Track, CatalogError> {
        check_id(id)?;
        self.store.get_by_id(id).await?
            .ok_or_else(|| track_not_found(id))
    }

    pub async fn get_all_tracks(&self) -> Result<Vec<Track>, CatalogError> {
        Ok(self.store.list().await?)
    }

    /// Writes the given fields straight to the store. An empty patch only
    /// bumps `updated_at`.
    pub async fn update_track(&self, id: &str, patch: &TrackPatch) -> Result<Track, CatalogError> {
        check_id(id)?;
        validate_patch(patch).map_err(|e| CatalogError::BadRequest(e.to_string()))?;
        if patch.is_empty() {
            debug!(id, "catalog.update.empty");
        }

        match self.store.update(id, patch).await {
            Ok(Some(track)) => {
                info!(id = %track.id, "catalog.updated");
                Ok(track)
            }
            Ok(None) => Err(track_not_found(id)),
            Err(StoreError::Conflict(_)) => Err(CatalogError::BadRequest(format!(
                "ISRC {} already belongs to another track",
                patch.isrc.as_deref().unwrap_or_default()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_track(&self, id: &str) -> Result<Track, CatalogError> {
        check_id(id)?;
        let track = self.store.delete(id).await?
            .ok_or_else(|| track_not_found(id))?;
        info!(id = %track.id, isrc = %track.isrc, "catalog.deleted");
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::persistent::SqliteCatalog;
    use crate::resolver::tests::{ooh_la_la, StubProvider};
    use crate::types::TrackMetadata;

    async fn catalog_with(provider: StubProvider) -> (TrackCatalog, Arc<StubProvider>) {
        let store: Arc<dyn CatalogStore> =
            Arc::new(SqliteCatalog::init("sqlite::memory:").await.unwrap());
        let provider = Arc::new(provider);
        let resolver = Resolver::new(store.clone(), provider.clone());
        (TrackCatalog::new(store, resolver), provider)
    }

    async fn seeded() -> (TrackCatalog, Track) {
        let (catalog, _) = catalog_with(StubProvider::returning(vec![ooh_la_la()])).await;
        let track = catalog.find_track("Ooh La La", "Faces").await.unwrap();
        (catalog, track)
    }

    #[tokio::test]
    async fn empty_name_is_rejected_before_resolution() {
        let (catalog, provider) = catalog_with(StubProvider::returning(vec![ooh_la_la()])).await;
        let err = catalog.find_track("", "Faces").await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_name_still_resolves() {
        let (catalog, provider) = catalog_with(StubProvider::returning(vec![ooh_la_la()])).await;
        let track = catalog.find_track(" ", "Faces").await.unwrap();
        assert_eq!(track.isrc, "USWB10104988");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_track_checks_id_then_existence() {
        let (catalog, track) = seeded().await;

        assert_eq!(catalog.get_track(&track.id).await.unwrap(), track);
        assert_eq!(catalog.get_track("not-a-uuid").await.unwrap_err().code(), "BAD_REQUEST");
        let missing = Uuid::new_v4().to_string();
        assert_eq!(catalog.get_track(&missing).await.unwrap_err().code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn lists_everything() {
        let (catalog, track) = seeded().await;
        assert_eq!(catalog.get_all_tracks().await.unwrap(), vec![track]);
    }

    #[tokio::test]
    async fn update_validates_and_applies() {
        let (catalog, track) = seeded().await;

        let bad = TrackPatch { duration: Some(0), ..Default::default() };
        assert_eq!(catalog.update_track(&track.id, &bad).await.unwrap_err().code(), "BAD_REQUEST");

        let patch = TrackPatch { release_date: Some("1973-03-01".into()), ..Default::default() };
        let updated = catalog.update_track(&track.id, &patch).await.unwrap();
        assert_eq!(updated.release_date, "1973-03-01");
        assert_eq!(updated.name, track.name);

        let missing = Uuid::new_v4().to_string();
        assert_eq!(catalog.update_track(&missing, &patch).await.unwrap_err().code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn empty_update_only_touches_updated_at() {
        let (catalog, track) = seeded().await;
        let empty = TrackPatch::default();
        assert!(empty.is_empty());

        let touched = catalog.update_track(&track.id, &empty).await.unwrap();
        assert_eq!(touched.name, track.name);
        assert_eq!(touched.isrc, track.isrc);
        assert_eq!(touched.created_at, track.created_at);
        assert!(touched.updated_at >= track.updated_at);
    }

    #[tokio::test]
    async fn update_to_taken_isrc_is_bad_request() {
        let store = Arc::new(SqliteCatalog::init("sqlite::memory:").await.unwrap());
        let a = store.create(&TrackMetadata {
            name: "A".into(), artist_name: "X".into(), duration: 1,
            isrc: "AAAAA0000001".into(), release_date: "2001".into(),
        }).await.unwrap();
        store.create(&TrackMetadata {
            name: "B".into(), artist_name: "X".into(), duration: 1,
            isrc: "AAAAA0000002".into(), release_date: "2001".into(),
        }).await.unwrap();

        let resolver = Resolver::new(store.clone(), Arc::new(StubProvider::returning(vec![])));
        let catalog = TrackCatalog::new(store, resolver);

        let patch = TrackPatch { isrc: Some("AAAAA0000002".into()), ..Default::default() };
        let err = catalog.update_track(&a.id, &patch).await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[tokio::test]
    async fn delete_returns_track_once() {
        let (catalog, track) = seeded().await;

        assert_eq!(catalog.delete_track(&track.id).await.unwrap(), track);
        assert_eq!(catalog.delete_track(&track.id).await.unwrap_err().code(), "NOT_FOUND");
        assert!(catalog.get_all_tracks().await.unwrap().is_empty());
    }
}
