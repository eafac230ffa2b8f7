use heartline_shared::errors::AppResult;
use heartline_shared::types::AuthUser;

use crate::domain::discovery::{self, resolve_origin};
use crate::domain::geo::GeoPoint;
use crate::models::Candidate;
use crate::services::{graph, identity};
use crate::AppState;

/// Nearby users the caller has no relationship with, nearest first.
pub async fn feed(state: &AppState, auth: &AuthUser, requested: Option<GeoPoint>) -> AppResult<Vec<Candidate>> {
    let viewer = identity::resolve(state, auth).await?;
    let origin = resolve_origin(requested, viewer.position())?;
    let limit = state.config.discovery_limit;

    let candidates = state.store.nearest_candidates(&viewer, origin, limit).await?;

    // Pairs may have changed since the candidate query ran.
    let excluded = graph::relationships(state, viewer.id).await?.excluded();
    let eligible = candidates
        .into_iter()
        .filter(|c| discovery::is_eligible(&viewer, c, &excluded))
        .collect();

    let feed = discovery::rank(origin, eligible, limit);
    tracing::debug!(user_id = %viewer.id, count = feed.len(), "discovery feed built");
    Ok(feed)
}
