//!
//! src/types.rs
//!
//! Domain types shared by the store, the resolver and the transport
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical persisted track. `isrc` is unique across the catalog,
/// (`name`, `artist_name`) is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub duration: i64,
    pub isrc: String,
    pub release_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, track-shaped metadata ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub name: String,
    pub artist_name: String,
    pub duration: i64,
    pub isrc: String,
    pub release_date: String,
}

/// Partial field set for a direct update; `None` leaves the column as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub duration: Option<i64>,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
}

impl TrackPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.artist_name.is_none()
            && self.duration.is_none()
            && self.isrc.is_none()
            && self.release_date.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// User as it may leave the process, without the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self { id: u.id, email: u.email.clone() }
    }
}
