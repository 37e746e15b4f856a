//!
//! src/lib.rs
//!
//! Track catalog service. Tracks are looked up by (name, artist) in the
//! local catalog and resolved through the ACRCloud metadata api on a miss,
//! deduplicated by ISRC.
//!

pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod graphql;
pub mod logging;
pub mod normalize;
pub mod persistent;
pub mod resolver;
pub mod server;
pub mod types;

pub use errors::CatalogError;
