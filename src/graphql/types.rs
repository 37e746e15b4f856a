use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};

use crate::types::{Track, TrackPatch};

/// A catalog track
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Track")]
pub struct TrackObject {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    /// Milliseconds
    pub duration: i64,
    #[graphql(name = "ISRC")]
    pub isrc: String,
    pub release_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Track> for TrackObject {
    fn from(t: Track) -> Self {
        Self {
            id: t.id,
            name: t.name,
            artist_name: t.artist_name,
            duration: t.duration,
            isrc: t.isrc,
            release_date: t.release_date,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Fields left out are not changed
#[derive(Debug, Clone, InputObject)]
pub struct UpdateTrackInput {
    pub id: String,
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub duration: Option<i64>,
    #[graphql(name = "ISRC")]
    pub isrc: Option<String>,
    pub release_date: Option<String>,
}

impl UpdateTrackInput {
    pub fn into_parts(self) -> (String, TrackPatch) {
        let patch = TrackPatch {
            name: self.name,
            artist_name: self.artist_name,
            duration: self.duration,
            isrc: self.isrc,
            release_date: self.release_date,
        };
        (self.id, patch)
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct DeleteTrackInput {
    pub id: String,
}
