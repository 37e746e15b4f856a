use async_graphql::{Context, Object, Result};

use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{DeleteTrackInput, TrackObject, UpdateTrackInput};
use crate::graphql::{require_user, surface};

pub struct Mutation;

#[Object]
impl Mutation {
    #[graphql(name = "UpdateTrack")]
    async fn update_track(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "UpdateTrackInput")] update_track_input: UpdateTrackInput,
    ) ->
        Result<TrackObject> {
        require_user(ctx, "UpdateTrack")?;
        let context = ctx.data::<GraphQLContext>()?;
        let (id, patch) = update_track_input.into_parts();
        context.catalog.update_track(&id, &patch).await
            .map(TrackObject::from)
            .map_err(|e| surface("UpdateTrack", e))
    }

    /// Returns the track as it was before deletion
    #[graphql(name = "DeleteTrack")]
    async fn delete_track(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "DeleteTrackInput")] delete_track_input: DeleteTrackInput,
    ) ->
        Result<TrackObject> {
        require_user(ctx, "DeleteTrack")?;
        let context = ctx.data::<GraphQLContext>()?;
        context.catalog.delete_track(&delete_track_input.id).await
            .map(TrackObject::from)
            .map_err(|e| surface("DeleteTrack", e))
    }
}
