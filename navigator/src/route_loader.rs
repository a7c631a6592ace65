use std::path::Path;

use anyhow::{bail, Context};
use geo::{Distance, Haversine};
use geo_types::{LineString, Point};
use gpx::Waypoint;
use route_tracker_lib::{
    route::{Maneuver, Route, Stop},
    spatial::SpatialGeometry,
};

/// Speed used to estimate maneuver durations, about 50 km/h.
const ASSUMED_SPEED_MPS: f64 = 13.9;

/// Loads a route from a GPX file. The first `<rte>` is used, or the first track when
/// there are no routes. Every leg between two consecutive points becomes a maneuver,
/// named after the point it starts at.
pub fn load_route(path: &Path) -> anyhow::Result<Route> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open route {:?}", path))?;
    let gpx = gpx::read(std::io::BufReader::new(file)).with_context(|| format!("Failed to parse route {:?}", path))?;

    let (name, points) = if let Some(route) = gpx.routes.into_iter().next() {
        (route.name, route.points)
    } else if let Some(track) = gpx.tracks.into_iter().next() {
        (track.name, track.segments.into_iter().flat_map(|segment| segment.points).collect())
    } else {
        bail!("{:?} contains neither a route nor a track", path);
    };

    build_route(name.unwrap_or_else(|| "Unnamed route".to_string()), &points)
}

fn build_route(name: String, points: &[Waypoint]) -> anyhow::Result<Route> {
    if points.len() < 2 {
        bail!("A route needs at least 2 points, got {}", points.len());
    }

    let maneuvers = points
        .windows(2)
        .enumerate()
        .map(|(i, leg)| {
            let (from, to) = (leg[0].point(), leg[1].point());
            let length_m = Haversine.distance(from, to);
            let text = leg[0].name.clone().unwrap_or_else(|| if i == 0 { "Depart".to_string() } else { "Continue".to_string() });
            Maneuver {
                length_m,
                duration_s: length_m / ASSUMED_SPEED_MPS,
                ..Maneuver::new(text, Some(SpatialGeometry::wgs84(LineString::from(vec![from, to]))))
            }
        })
        .collect();

    let stops = [points.first(), points.last()]
        .into_iter()
        .flatten()
        .zip(["Start", "Destination"])
        .map(|(point, fallback)| Stop {
            name: point.name.clone().unwrap_or_else(|| fallback.to_string()),
            position: point.point(),
        })
        .collect();

    let line: LineString = points.iter().map(|point| point.point()).collect::<Vec<Point>>().into();
    Ok(Route::new(name, stops, maneuvers).with_geometry(SpatialGeometry::wgs84(line)))
}
