use geo_types::Geometry;
use route_tracker_lib::spatial::SpatialGeometry;
use route_tracker_navigation::SessionEvent;
use serde::Serialize;

/// One session event as written with `--events-json`, one object per line.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord {
    Started { route: String, maneuvers: usize },
    Progress {
        latitude: f64,
        longitude: f64,
        on_route: bool,
        maneuver_index: usize,
        maneuver: Option<String>,
        maneuver_text: String,
        summary_text: String,
    },
    Location { latitude: f64, longitude: f64 },
    Geometry { remaining_points: usize, traversed_points: usize },
    Guidance { text: String, maneuver_index: Option<usize> },
    RerouteStarted,
    RerouteCompleted { route: String },
    RerouteFailed { error: String },
    DestinationReached,
    Cancelled,
    LocationError { error: String },
}

fn point_count(geometry: Option<&SpatialGeometry>) -> usize {
    match geometry.map(|g| &g.geometry) {
        Some(Geometry::LineString(line)) => line.0.len(),
        Some(Geometry::MultiLineString(lines)) => lines.0.iter().map(|line| line.0.len()).sum(),
        Some(Geometry::Point(_)) => 1,
        _ => 0,
    }
}

impl From<&SessionEvent> for EventRecord {
    fn from(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Started { route } => EventRecord::Started {
                route: route.name.clone(),
                maneuvers: route.maneuvers.len(),
            },
            SessionEvent::ProgressUpdated(update) => EventRecord::Progress {
                latitude: update.display_fix.latitude(),
                longitude: update.display_fix.longitude(),
                on_route: update.snapshot.on_route,
                maneuver_index: update.display_maneuver_index,
                maneuver: update.snapshot.maneuvers.get(update.display_maneuver_index).map(|m| m.text.clone()),
                maneuver_text: update.maneuver_text.clone(),
                summary_text: update.summary_text.clone(),
            },
            SessionEvent::LocationUpdated { display_fix } => EventRecord::Location {
                latitude: display_fix.latitude(),
                longitude: display_fix.longitude(),
            },
            SessionEvent::RouteGeometryUpdated(geometry) => EventRecord::Geometry {
                remaining_points: point_count(geometry.remaining.as_ref()),
                traversed_points: point_count(geometry.traversed.as_ref()),
            },
            SessionEvent::VoiceGuidance { guidance, display_maneuver_index } => EventRecord::Guidance {
                text: guidance.text.clone(),
                maneuver_index: *display_maneuver_index,
            },
            SessionEvent::RerouteStarted => EventRecord::RerouteStarted,
            SessionEvent::RerouteCompleted { route } => EventRecord::RerouteCompleted { route: route.name.clone() },
            SessionEvent::RerouteFailed { error } => EventRecord::RerouteFailed { error: error.to_string() },
            SessionEvent::DestinationReached => EventRecord::DestinationReached,
            SessionEvent::Cancelled => EventRecord::Cancelled,
            SessionEvent::LocationError(error) => EventRecord::LocationError { error: error.to_string() },
        }
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventRecord::Started { route, maneuvers } => write!(f, "Navigating '{}' ({} maneuvers)", route, maneuvers),
            EventRecord::Progress { latitude, longitude, on_route, maneuver, maneuver_text, summary_text, .. } => write!(
                f,
                "{:.6}, {:.6}{}  {} {}  [{}]",
                latitude,
                longitude,
                if *on_route { "" } else { " (off route)" },
                maneuver_text,
                maneuver.as_deref().unwrap_or("-"),
                summary_text
            ),
            EventRecord::Location { latitude, longitude } => write!(f, "{:.6}, {:.6}  (rerouting)", latitude, longitude),
            EventRecord::Geometry { remaining_points, traversed_points } => {
                write!(f, "Route line: {} points traversed, {} remaining", traversed_points, remaining_points)
            }
            EventRecord::Guidance { text, .. } => write!(f, "\"{}\"", text),
            EventRecord::RerouteStarted => write!(f, "Rerouting..."),
            EventRecord::RerouteCompleted { route } => write!(f, "Rerouted onto '{}'", route),
            EventRecord::RerouteFailed { error } => write!(f, "Reroute failed: {}", error),
            EventRecord::DestinationReached => write!(f, "You have arrived"),
            EventRecord::Cancelled => write!(f, "Navigation cancelled"),
            EventRecord::LocationError { error } => write!(f, "Location error: {}", error),
        }
    }
}
