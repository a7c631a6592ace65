use async_trait::async_trait;
use geo::{Closest, ClosestPoint, Distance, Haversine};
use geo_types::{Coord, Geometry, LineString, Point};
use parking_lot::Mutex;
use route_tracker_lib::{
    fix::RawFix,
    guidance::{GuidanceKind, VoiceGuidance},
    progress::{DestinationStatus, RouteProgressSnapshot, TrackingProgress},
    route::{Maneuver, Route},
    spatial::{SpatialGeometry, SpatialReference},
    units::UnitSystem,
};
use tracing::debug;

use crate::{
    format,
    geometry::{GeometryProjector, WebMercatorProjector},
    tracker::{ReroutingParameters, RouteTracker, TrackerEvent, TrackerEventSink},
    TrackerError,
};

/// Distances (meters) the reference tracker decides with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceTrackerSettings {
    /// A fix further than this from every remaining maneuver is off route.
    pub on_route_tolerance_m: f64,
    /// Guidance for the next maneuver plays once this close to the end of the current one.
    pub approach_distance_m: f64,
    pub arrival_radius_m: f64,
}

impl Default for ReferenceTrackerSettings {
    fn default() -> Self {
        Self {
            on_route_tolerance_m: 50.0,
            approach_distance_m: 150.0,
            arrival_radius_m: 25.0,
        }
    }
}

struct TrackedManeuver {
    line: Option<LineString>,
    length_m: f64,
    duration_s: f64,
}

impl TrackedManeuver {
    fn new(maneuver: &Maneuver) -> Self {
        let line = maneuver.geometry.as_ref().and_then(wgs84_line);
        let measured = line.as_ref().map(line_length_m).unwrap_or(0.0);
        Self {
            length_m: if measured > 0.0 { measured } else { maneuver.length_m },
            duration_s: maneuver.duration_s,
            line,
        }
    }

    fn time_for(&self, meters: f64) -> f64 {
        if self.length_m > 0.0 {
            self.duration_s * (meters / self.length_m).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

struct TrackerState {
    current: usize,
    sink: Option<TrackerEventSink>,
    unit_system: UnitSystem,
    announced_maneuver: Option<usize>,
    announced_destination: bool,
}

/// A simple route follower on top of `geo`, for demos and the CLI.
///
/// Progress only moves forward: the current maneuver is the nearest one at
/// or after the previous current maneuver. It never reroutes.
pub struct ReferenceTracker {
    settings: ReferenceTrackerSettings,
    maneuvers: Vec<Maneuver>,
    tracked: Vec<TrackedManeuver>,
    destination: Option<Point>,
    state: Mutex<TrackerState>,
}

impl ReferenceTracker {
    pub fn new(route: &Route) -> Self {
        Self::with_settings(route, ReferenceTrackerSettings::default())
    }

    pub fn with_settings(route: &Route, settings: ReferenceTrackerSettings) -> Self {
        let tracked: Vec<TrackedManeuver> = route.maneuvers.iter().map(TrackedManeuver::new).collect();
        let destination = route
            .destination()
            .map(|stop| stop.position)
            .or_else(|| tracked.iter().rev().find_map(|m| m.line.as_ref()?.0.last().copied().map(Point::from)));

        Self {
            settings,
            maneuvers: route.maneuvers.clone(),
            tracked,
            destination,
            state: Mutex::new(TrackerState {
                current: 0,
                sink: None,
                unit_system: UnitSystem::default(),
                announced_maneuver: None,
                announced_destination: false,
            }),
        }
    }

    /// Nearest maneuver at or after `from`: index, split point, segment and distance in meters.
    fn locate(&self, position: Point, from: usize) -> Option<(usize, Located)> {
        self.tracked
            .iter()
            .enumerate()
            .skip(from)
            .filter_map(|(index, maneuver)| Some((index, locate_on_line(maneuver.line.as_ref()?, position)?)))
            .min_by(|(_, a), (_, b)| a.distance_m.total_cmp(&b.distance_m))
    }

    fn announce(&self, state: &TrackerState, guidance: VoiceGuidance) {
        debug!("Announcing '{}'", guidance.text);
        if let Some(sink) = &state.sink {
            sink.send(TrackerEvent::VoiceGuidance(guidance));
        }
    }
}

#[async_trait]
impl RouteTracker for ReferenceTracker {
    async fn track_location(&self, fix: &RawFix) -> Result<RouteProgressSnapshot, TrackerError> {
        if !fix.is_valid() {
            return Err(TrackerError::RejectedFix(format!("invalid horizontal accuracy {}", fix.horizontal_accuracy)));
        }

        let mut state = self.state.lock();
        let Some((index, located)) = self.locate(fix.position, state.current) else {
            return Err(TrackerError::RejectedFix("route has no trackable geometry".into()));
        };

        let on_route = located.distance_m <= self.settings.on_route_tolerance_m;
        if on_route {
            state.current = index;
        }
        let current = state.current;

        let mut snapshot = RouteProgressSnapshot {
            on_route,
            current_maneuver_index: current,
            maneuvers: self.maneuvers.clone(),
            ..Default::default()
        };

        if on_route {
            let maneuver = &self.tracked[current];
            let (traversed, remaining) = match &maneuver.line {
                Some(line) => split_line(line, &located),
                None => (LineString::new(Vec::new()), LineString::new(Vec::new())),
            };

            let maneuver_remaining_m = line_length_m(&remaining);
            let later = &self.tracked[current + 1..];
            let earlier = &self.tracked[..current];

            snapshot.maneuver_progress = TrackingProgress {
                remaining_distance_m: maneuver_remaining_m,
                remaining_time_s: maneuver.time_for(maneuver_remaining_m),
                traversed_distance_m: line_length_m(&traversed),
            };
            snapshot.route_progress = TrackingProgress {
                remaining_distance_m: maneuver_remaining_m + later.iter().map(|m| m.length_m).sum::<f64>(),
                remaining_time_s: maneuver.time_for(maneuver_remaining_m) + later.iter().map(|m| m.duration_s).sum::<f64>(),
                traversed_distance_m: line_length_m(&traversed) + earlier.iter().map(|m| m.length_m).sum::<f64>(),
            };
            snapshot.remaining_geometry = Some(SpatialGeometry::wgs84(concat_lines(std::iter::once(&remaining).chain(later.iter().filter_map(|m| m.line.as_ref())))));
            snapshot.traversed_geometry = Some(SpatialGeometry::wgs84(concat_lines(
                earlier.iter().filter_map(|m| m.line.as_ref()).chain(std::iter::once(&traversed)),
            )));

            // The last maneuver only gets the destination announcement
            let unit_system = state.unit_system;
            if !later.is_empty() && maneuver_remaining_m <= self.settings.approach_distance_m && state.announced_maneuver != Some(current) {
                state.announced_maneuver = Some(current);
                let text = format!(
                    "In {}, {}",
                    format::maneuver_distance_text(maneuver_remaining_m, unit_system).trim_end_matches('.'),
                    self.maneuvers[current + 1].text
                );
                self.announce(&state, VoiceGuidance::new(text, GuidanceKind::ApproachingManeuver));
            }
        }

        if let Some(destination) = self.destination {
            let distance_m = Haversine.distance(fix.position, destination);
            snapshot.destination_status = if distance_m <= self.settings.arrival_radius_m {
                DestinationStatus::Reached
            } else if distance_m <= self.settings.approach_distance_m {
                DestinationStatus::Approaching
            } else {
                DestinationStatus::NotReached
            };

            if snapshot.destination_status != DestinationStatus::NotReached && !state.announced_destination {
                state.announced_destination = true;
                self.announce(&state, VoiceGuidance::new("Your destination is ahead", GuidanceKind::ApproachingDestination));
            }
        }

        Ok(snapshot)
    }

    fn set_event_sink(&self, sink: Option<TrackerEventSink>) {
        self.state.lock().sink = sink;
    }

    async fn enable_rerouting(&self, _parameters: ReroutingParameters) -> Result<(), TrackerError> {
        Err(TrackerError::ReroutingUnsupported)
    }

    fn disable_rerouting(&self) {}

    fn set_voice_guidance_unit_system(&self, unit_system: UnitSystem) {
        self.state.lock().unit_system = unit_system;
    }
}

/// Where a position falls on a line.
struct Located {
    segment: usize,
    point: Point,
    distance_m: f64,
}

fn wgs84_line(geometry: &SpatialGeometry) -> Option<LineString> {
    match WebMercatorProjector.project(geometry, SpatialReference::WGS84)?.geometry {
        Geometry::LineString(line) => Some(line),
        Geometry::Line(line) => Some(LineString::from(vec![line.start, line.end])),
        Geometry::Point(point) => Some(LineString::from(vec![point.0])),
        _ => None,
    }
}

fn line_length_m(line: &LineString) -> f64 {
    line.lines().map(|segment| Haversine.distance(Point::from(segment.start), Point::from(segment.end))).sum()
}

fn locate_on_line(line: &LineString, position: Point) -> Option<Located> {
    if let [only] = line.0.as_slice() {
        let point = Point::from(*only);
        return Some(Located { segment: 0, point, distance_m: Haversine.distance(point, position) });
    }

    line.lines()
        .enumerate()
        .filter_map(|(segment, line)| match line.closest_point(&position) {
            Closest::Intersection(point) | Closest::SinglePoint(point) => Some(Located {
                segment,
                point,
                distance_m: Haversine.distance(point, position),
            }),
            Closest::Indeterminate => None,
        })
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
}

/// Splits `line` at a located point into the traversed and remaining parts.
fn split_line(line: &LineString, located: &Located) -> (LineString, LineString) {
    let split: Coord = located.point.0;
    let coords = &line.0;
    if coords.len() < 2 {
        return (LineString::from(vec![split]), LineString::from(vec![split]));
    }

    let mut traversed: Vec<Coord> = coords[..=located.segment].to_vec();
    traversed.push(split);
    let mut remaining = vec![split];
    remaining.extend_from_slice(&coords[located.segment + 1..]);

    (LineString::from(traversed), LineString::from(remaining))
}

fn concat_lines<'a>(lines: impl Iterator<Item = &'a LineString>) -> LineString {
    let mut coords: Vec<Coord> = Vec::new();
    for line in lines {
        for coord in line.coords() {
            if coords.last() != Some(coord) {
                coords.push(*coord);
            }
        }
    }
    LineString::from(coords)
}
