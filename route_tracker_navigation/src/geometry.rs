use std::f64::consts::FRAC_PI_4;

use geo::{Closest, ClosestPoint, MapCoords};
use geo_types::{Coord, Geometry, Point};
use route_tracker_lib::spatial::{SpatialGeometry, SpatialReference};

/// Reprojects geometries between spatial references. `None` when the pair is unsupported.
pub trait GeometryProjector: Send + Sync {
    fn project(&self, geometry: &SpatialGeometry, target: SpatialReference) -> Option<SpatialGeometry>;
}

/// Finds the point of a geometry closest to a given point, in the geometry's own coordinates.
pub trait NearestPointFinder: Send + Sync {
    fn nearest_point(&self, geometry: &Geometry, point: Point) -> Option<Point>;
}

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// Projector for WGS84 and spherical web mercator.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorProjector;

impl GeometryProjector for WebMercatorProjector {
    fn project(&self, geometry: &SpatialGeometry, target: SpatialReference) -> Option<SpatialGeometry> {
        let source = geometry.spatial_reference;
        if source == target {
            return Some(geometry.clone());
        }

        let projected = match (source, target) {
            (SpatialReference::WGS84, SpatialReference::WEB_MERCATOR) => geometry.geometry.map_coords(wgs84_to_web_mercator),
            (SpatialReference::WEB_MERCATOR, SpatialReference::WGS84) => geometry.geometry.map_coords(web_mercator_to_wgs84),
            _ => return None,
        };

        Some(SpatialGeometry::new(projected, target))
    }
}

pub fn wgs84_to_web_mercator(coord: Coord) -> Coord {
    let latitude = coord.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    Coord {
        x: EARTH_RADIUS_M * coord.x.to_radians(),
        y: EARTH_RADIUS_M * (FRAC_PI_4 + latitude.to_radians() / 2.0).tan().ln(),
    }
}

pub fn web_mercator_to_wgs84(coord: Coord) -> Coord {
    Coord {
        x: (coord.x / EARTH_RADIUS_M).to_degrees(),
        y: (2.0 * (coord.y / EARTH_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
    }
}

/// Planar nearest point using `geo`'s closest point search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestPointFinder;

impl NearestPointFinder for ClosestPointFinder {
    fn nearest_point(&self, geometry: &Geometry, point: Point) -> Option<Point> {
        match geometry.closest_point(&point) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
            Closest::Indeterminate => None,
        }
    }
}
