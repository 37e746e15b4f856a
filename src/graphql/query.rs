use async_graphql::{Context, Object, Result};

use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::TrackObject;
use crate::graphql::{require_user, surface};

pub struct Query;

#[Object]
impl Query {
    /// Local match for (name, artistName), otherwise resolved through the
    /// metadata provider and stored
    #[graphql(name = "FindTrack")]
    async fn find_track(&self, ctx: &Context<'_>, name: String, artist_name: String) ->
        Result<TrackObject> {
        require_user(ctx, "FindTrack")?;
        let context = ctx.data::<GraphQLContext>()?;
        context.catalog.find_track(&name, &artist_name).await
            .map(TrackObject::from)
            .map_err(|e| surface("FindTrack", e))
    }

    #[graphql(name = "GetTrack")]
    async fn get_track(&self, ctx: &Context<'_>, id: String) -> Result<TrackObject> {
        require_user(ctx, "GetTrack")?;
        let context = ctx.data::<GraphQLContext>()?;
        context.catalog.get_track(&id).await
            .map(TrackObject::from)
            .map_err(|e| surface("GetTrack", e))
    }

    #[graphql(name = "GetAllTracks")]
    async fn get_all_tracks(&self, ctx: &Context<'_>) -> Result<Vec<TrackObject>> {
        require_user(ctx, "GetAllTracks")?;
        let context = ctx.data::<GraphQLContext>()?;
        match context.catalog.get_all_tracks().await {
            Ok(tracks) => Ok(tracks.into_iter().map(TrackObject::from).collect()),
            Err(e) => Err(surface("GetAllTracks", e)),
        }
    }
}
