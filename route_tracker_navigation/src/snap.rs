use route_tracker_lib::{fix::RawFix, progress::RouteProgressSnapshot, spatial::SpatialReference};

use crate::geometry::{GeometryProjector, NearestPointFinder};

/// Moves `fix` onto the geometry of the current maneuver for display.
///
/// Only latitude/longitude change. Whenever the tracker is not confident
/// (no snapshot, off route, no maneuvers) or a geometry lookup comes back
/// empty, the raw fix is returned as is.
pub fn snap(
    fix: &RawFix,
    snapshot: Option<&RouteProgressSnapshot>,
    projector: &dyn GeometryProjector,
    nearest: &dyn NearestPointFinder,
) -> RawFix {
    let Some(snapshot) = snapshot else {
        return *fix;
    };

    if !snapshot.on_route || snapshot.maneuvers.is_empty() {
        return *fix;
    }

    let Some(maneuver_geometry) = snapshot.current_maneuver().and_then(|maneuver| maneuver.geometry.as_ref()) else {
        return *fix;
    };

    // Fixes are always WGS84
    let Some(projected) = projector.project(maneuver_geometry, SpatialReference::WGS84) else {
        return *fix;
    };

    match nearest.nearest_point(&projected.geometry, fix.position) {
        Some(snapped) => fix.with_position(snapped),
        None => *fix,
    }
}
