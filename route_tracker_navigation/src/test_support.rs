use std::{
    collections::VecDeque,
    sync::{atomic::{AtomicUsize, Ordering}, Arc},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use geo_types::{line_string, LineString, Point};
use parking_lot::Mutex;
use route_tracker_lib::{
    fix::RawFix,
    progress::{DestinationStatus, RouteProgressSnapshot, TrackingProgress},
    route::{Maneuver, Route, Stop},
    spatial::SpatialGeometry,
    units::UnitSystem,
};

use crate::{
    feed::{FeedSink, LocationFeed},
    tracker::{ReroutingParameters, RouteTracker, TrackerEvent, TrackerEventSink},
    LocationError, TrackerError,
};

pub(crate) const MANEUVER_COUNT: usize = 4;

pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub(crate) fn fix_at(x: f64, y: f64) -> RawFix {
    RawFix::new(Point::new(x, y), 5.0, fixed_time())
}

pub(crate) fn maneuver(text: &str, line: LineString) -> Maneuver {
    Maneuver::new(text, Some(SpatialGeometry::wgs84(line)))
}

/// Maneuver `i` runs from (i, 0) to (i + 1, 0).
pub(crate) fn maneuvers() -> Vec<Maneuver> {
    (0..MANEUVER_COUNT)
        .map(|i| {
            let x = i as f64;
            Maneuver {
                length_m: 100.0,
                duration_s: 10.0,
                ..maneuver(&format!("Maneuver {}", i), line_string![(x: x, y: 0.0), (x: x + 1.0, y: 0.0)])
            }
        })
        .collect()
}

pub(crate) fn test_route() -> Route {
    let stops = vec![
        Stop { name: "Start".into(), position: Point::new(0.0, 0.0) },
        Stop { name: "End".into(), position: Point::new(MANEUVER_COUNT as f64, 0.0) },
    ];
    Route::new("Test route", stops, maneuvers())
}

pub(crate) fn snapshot_at(index: usize, on_route: bool) -> RouteProgressSnapshot {
    RouteProgressSnapshot {
        on_route,
        current_maneuver_index: index,
        maneuvers: maneuvers(),
        maneuver_progress: TrackingProgress { remaining_distance_m: 482.8, remaining_time_s: 30.0, traversed_distance_m: 0.0 },
        route_progress: TrackingProgress { remaining_distance_m: 6_759.2, remaining_time_s: 720.0, traversed_distance_m: 0.0 },
        ..Default::default()
    }
}

pub(crate) fn arrived_snapshot() -> RouteProgressSnapshot {
    RouteProgressSnapshot {
        destination_status: DestinationStatus::Reached,
        ..snapshot_at(MANEUVER_COUNT - 1, true)
    }
}

#[derive(Default)]
struct MockTrackerState {
    responses: VecDeque<Result<RouteProgressSnapshot, TrackerError>>,
    tracked: Vec<RawFix>,
    sink: Option<TrackerEventSink>,
    rerouting: Vec<ReroutingParameters>,
    rerouting_active: bool,
    unit_system: Option<UnitSystem>,
}

/// Answers fixes from a script, falling back to an on-route snapshot at maneuver 0.
#[derive(Default)]
pub(crate) struct MockTracker {
    state: Mutex<MockTrackerState>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTracker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay), ..Self::default() })
    }

    pub(crate) fn respond(&self, response: Result<RouteProgressSnapshot, TrackerError>) {
        self.state.lock().responses.push_back(response);
    }

    pub(crate) fn tracked(&self) -> Vec<RawFix> {
        self.state.lock().tracked.clone()
    }

    pub(crate) fn rerouting_requests(&self) -> Vec<ReroutingParameters> {
        self.state.lock().rerouting.clone()
    }

    pub(crate) fn rerouting_active(&self) -> bool {
        self.state.lock().rerouting_active
    }

    pub(crate) fn unit_system(&self) -> Option<UnitSystem> {
        self.state.lock().unit_system
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Sends `event` the way the routing engine would. False when detached.
    pub(crate) fn emit(&self, event: TrackerEvent) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.is_some_and(|sink| sink.send(event))
    }
}

#[async_trait]
impl RouteTracker for MockTracker {
    async fn track_location(&self, fix: &RawFix) -> Result<RouteProgressSnapshot, TrackerError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut state = self.state.lock();
            state.tracked.push(*fix);
            state.responses.pop_front().unwrap_or_else(|| Ok(snapshot_at(0, true)))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn set_event_sink(&self, sink: Option<TrackerEventSink>) {
        self.state.lock().sink = sink;
    }

    async fn enable_rerouting(&self, parameters: ReroutingParameters) -> Result<(), TrackerError> {
        let mut state = self.state.lock();
        state.rerouting.push(parameters);
        state.rerouting_active = true;
        Ok(())
    }

    fn disable_rerouting(&self) {
        self.state.lock().rerouting_active = false;
    }

    fn set_voice_guidance_unit_system(&self, unit_system: UnitSystem) {
        self.state.lock().unit_system = Some(unit_system);
    }
}

#[derive(Default)]
struct MockFeedState {
    sink: Option<FeedSink>,
    starts: usize,
    stops: usize,
    fail_start: bool,
}

/// A feed whose fixes are pushed by the test. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct MockFeed {
    state: Arc<Mutex<MockFeedState>>,
}

impl MockFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        let feed = Self::default();
        feed.state.lock().fail_start = true;
        feed
    }

    pub(crate) fn starts(&self) -> usize {
        self.state.lock().starts
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().stops
    }

    /// Delivers through the sink the feed was last started with, even after `stop`,
    /// like a platform callback racing the teardown.
    pub(crate) fn push_fix(&self, fix: RawFix) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.is_some_and(|sink| sink.on_fix(fix))
    }

    pub(crate) fn push_error(&self, error: LocationError) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.is_some_and(|sink| sink.on_error(error))
    }
}

impl LocationFeed for MockFeed {
    fn start(&mut self, sink: FeedSink) -> Result<(), LocationError> {
        let mut state = self.state.lock();
        if state.fail_start {
            return Err(LocationError::PermissionDenied);
        }
        state.starts += 1;
        state.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().stops += 1;
    }

    fn is_started(&self) -> bool {
        let state = self.state.lock();
        state.starts > state.stops
    }
}
