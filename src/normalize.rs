//!
//! src/normalize.rs
//!
//! Maps one untrusted provider record onto the internal track schema and
//! validates the field constraints shared with direct updates
//!

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::CatalogError;
use crate::types::{TrackMetadata, TrackPatch};

pub const ARTIST_SEPARATOR: &str = ", ";
pub const MIN_RELEASE_DATE_LEN: usize = 4;

/// Provider-shaped record. Every field is optional because the payload is
/// untrusted; a wrong-typed field reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawProviderRecord {
    pub name: Option<String>,
    pub duration_ms: Option<i64>,
    pub isrc: Option<String>,
    /// `None` when the list is missing or any entry lacks a string name
    pub artists: Option<Vec<String>>,
    pub release_date: Option<String>,
}

impl RawProviderRecord {
    pub fn from_value(record: &Value) -> Self {
        Self {
            name: record.get("name").and_then(|v| v.as_str()).map(str::to_string),
            duration_ms: record.get("duration_ms").and_then(|v| v.as_i64()),
            isrc: record.get("isrc").and_then(|v| v.as_str()).map(str::to_string),
            artists: record.get("artists").and_then(|v| v.as_array())
                .and_then(|arr| {
                    arr.iter()
                       .map(|a| a.get("name").and_then(|v| v.as_str()).map(str::to_string))
                       .collect::<Option<Vec<String>>>()
                }),
            release_date: record.pointer("/album/release_date")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// One violated constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: &'static str,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter()
        .map(|v| format!("{} {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// All constraints a record or patch failed, in field order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_violations(.violations))]
pub struct MetadataError {
    pub violations: Vec<FieldViolation>,
}

impl From<MetadataError> for CatalogError {
    fn from(e: MetadataError) -> Self { CatalogError::InvalidMetadata(e.to_string()) }
}

#[derive(Default)]
struct Checker {
    violations: Vec<FieldViolation>,
}

impl Checker {
    fn non_empty(&mut self, field: &'static str, value: &str) {
        if value.is_empty() {
            self.violations.push(FieldViolation { field, reason: "must not be empty" });
        }
    }

    fn positive(&mut self, field: &'static str, value: i64) {
        if value < 1 {
            self.violations.push(FieldViolation { field, reason: "must be at least 1" });
        }
    }

    fn release_date(&mut self, field: &'static str, value: &str) {
        if value.chars().count() < MIN_RELEASE_DATE_LEN {
            self.violations.push(FieldViolation {
                field, reason: "must be at least 4 characters"
            });
        }
    }

    fn missing(&mut self, field: &'static str) {
        self.violations.push(FieldViolation { field, reason: "is missing" });
    }

    fn finish(self) -> Result<(), MetadataError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(MetadataError { violations: self.violations })
        }
    }
}

/// Maps and validates a provider record. On failure nothing is returned but
/// the list of violations.
pub fn normalize(raw: &RawProviderRecord) -> Result<TrackMetadata, MetadataError> {
    let mut check = Checker::default();

    let name         = raw.name.clone().unwrap_or_default();
    let artist_name  = raw.artists.as_ref()
        .map(|names| names.join(ARTIST_SEPARATOR))
        .unwrap_or_default();
    let isrc         = raw.isrc.clone().unwrap_or_default();
    let release_date = raw.release_date.clone().unwrap_or_default();

    check.non_empty("name", &name);
    check.non_empty("artistName", &artist_name);
    match raw.duration_ms {
        Some(duration) => check.positive("duration", duration),
        None => check.missing("duration"),
    }
    check.non_empty("ISRC", &isrc);
    check.release_date("releaseDate", &release_date);

    check.finish()?;

    Ok(TrackMetadata {
        name,
        artist_name,
        // checked above
        duration: raw.duration_ms.unwrap_or_default(),
        isrc,
        release_date,
    })
}

/// Same constraints, applied only to the fields a direct update provides
pub fn validate_patch(patch: &TrackPatch) -> Result<(), MetadataError> {
    let mut check = Checker::default();
    if let Some(name) = &patch.name { check.non_empty("name", name); }
    if let Some(artist) = &patch.artist_name { check.non_empty("artistName", artist); }
    if let Some(duration) = patch.duration { check.positive("duration", duration); }
    if let Some(isrc) = &patch.isrc { check.non_empty("ISRC", isrc); }
    if let Some(date) = &patch.release_date {
        check.release_date("releaseDate", date);
    }
    check.finish()
}
