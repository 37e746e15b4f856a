//!
//! src/graphql/mod.rs
//!
//! GraphQL surface over the track catalog
//!

pub mod mutation;
pub mod query;
pub mod schema;
pub mod types;

use async_graphql::{Context, ErrorExtensions};
use tracing::{error, warn};

use crate::auth::AuthUser;
use crate::errors::{CatalogError, ErrorKind};

pub use schema::{create_schema, GraphQLContext, GraphQLSchema};

/// Attaches the taxonomy code as `extensions.code`
impl ErrorExtensions for CatalogError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.public_message())
            .extend_with(|_, e| e.set("code", code))
    }
}

/// Logs a failed operation once and converts it for the response
pub(crate) fn surface(op: &'static str, err: CatalogError) -> async_graphql::Error {
    match err.kind() {
        ErrorKind::InternalError | ErrorKind::UpstreamUnavailable =>
            error!(op, code = err.code(), error = %err, "graphql.error"),
        _ => warn!(op, code = err.code(), error = %err, "graphql.rejected"),
    }
    err.extend()
}

/// Every operation goes through this before touching the catalog
pub(crate) fn require_user<'a>(ctx: &Context<'a>, op: &'static str) ->
    async_graphql::Result<&'a AuthUser> {
    ctx.data_opt::<AuthUser>()
        .ok_or_else(|| surface(op, CatalogError::Unauthenticated("Unauthorized".to_string())))
}
