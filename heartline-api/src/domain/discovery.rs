use std::collections::HashSet;

use uuid::Uuid;

use heartline_shared::errors::{AppError, ErrorCode};

use crate::domain::geo::GeoPoint;
use crate::models::{Candidate, PublicProfile, User};

pub const DEFAULT_FEED_LIMIT: usize = 100;

/// The position distances are measured from: the one supplied with the
/// request, else the one on file.
pub fn resolve_origin(requested: Option<GeoPoint>, stored: Option<GeoPoint>) -> Result<GeoPoint, AppError> {
    requested.or(stored).ok_or_else(|| {
        AppError::new(
            ErrorCode::LocationRequired,
            "a location is required: send latitude and longitude or set your location first",
        )
    })
}

/// Whether `who` is open to `other`: an empty orientation accepts anyone,
/// otherwise `other` must have declared one of the accepted genders.
fn accepts(who: &User, other: &User) -> bool {
    who.orientation.is_empty()
        || other
            .gender
            .as_deref()
            .is_some_and(|g| who.orientation.iter().any(|o| o == g))
}

/// Mutual orientation check. Symmetric in its arguments.
pub fn orientation_compatible(viewer: &User, candidate: &User) -> bool {
    accepts(viewer, candidate) && accepts(candidate, viewer)
}

pub fn is_eligible(viewer: &User, candidate: &User, excluded: &HashSet<Uuid>) -> bool {
    candidate.id != viewer.id
        && candidate.position().is_some()
        && !excluded.contains(&candidate.id)
        && orientation_compatible(viewer, candidate)
}

/// Attach distances, sort nearest first (stable for ties) and cap.
pub fn rank(origin: GeoPoint, candidates: Vec<User>, limit: usize) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .iter()
        .filter_map(|user| {
            let position = user.position()?;
            Some(Candidate {
                profile: PublicProfile::from(user),
                distance_km: origin.distance_km(&position),
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(limit);
    ranked
}
