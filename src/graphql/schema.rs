use async_graphql::{EmptySubscription, Schema};

use crate::catalog::TrackCatalog;
use crate::graphql::{mutation::Mutation, query::Query};

/// Shared state every resolver reads
pub struct GraphQLContext {
    pub catalog: TrackCatalog,
}

pub type GraphQLSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn create_schema(catalog: TrackCatalog) -> GraphQLSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(GraphQLContext { catalog })
        .finish()
}
