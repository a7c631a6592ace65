use std::{
    collections::VecDeque,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use route_tracker_lib::{
    fix::RawFix,
    guidance::{GuidanceKind, VoiceGuidance},
    progress::RouteProgressSnapshot,
    route::Route,
    spatial::SpatialGeometry,
};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    channel::OwnedChannel,
    feed::{FeedEvent, LocationFeed},
    format,
    geometry::{ClosestPointFinder, GeometryProjector, NearestPointFinder, WebMercatorProjector},
    maneuver_display::ManeuverDisplayState,
    observer::{ObserverSet, Subscription},
    snap::snap,
    tracker::{ReroutingParameters, RouteTracker, TrackerEvent},
    LocationError, LocationErrorPolicy, NavigationConfig, TeardownPolicy, TrackerError, TrackingError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Rerouting,
    Completed,
}

/// Everything the UI needs to render one tracked fix.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub snapshot: Arc<RouteProgressSnapshot>,
    /// The fix moved onto the current maneuver, or the raw fix when snapping isn't possible.
    pub display_fix: RawFix,
    pub display_maneuver_index: usize,
    pub maneuver_text: String,
    pub summary_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    pub remaining: Option<SpatialGeometry>,
    pub traversed: Option<SpatialGeometry>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { route: Arc<Route> },
    ProgressUpdated(ProgressUpdate),
    /// A fix received while rerouting. Not snapped and not progress.
    LocationUpdated { display_fix: RawFix },
    RouteGeometryUpdated(Arc<RouteGeometry>),
    VoiceGuidance { guidance: VoiceGuidance, display_maneuver_index: Option<usize> },
    RerouteStarted,
    RerouteCompleted { route: Arc<Route> },
    RerouteFailed { error: TrackerError },
    DestinationReached,
    Cancelled,
    LocationError(Arc<LocationError>),
}

struct Core {
    state: SessionState,
    route: Option<Arc<Route>>,
    feed: Option<Box<dyn LocationFeed>>,
    tracker: Option<Arc<dyn RouteTracker>>,
    feed_channel: Option<OwnedChannel<FeedEvent>>,
    tracker_channel: Option<OwnedChannel<TrackerEvent>>,
    driver: Option<JoinHandle<()>>,
    display: ManeuverDisplayState,
    /// Current index and maneuver count of the last progress, for re-deriving the display index.
    last_progress: Option<(usize, usize)>,
    geometry: Option<Arc<RouteGeometry>>,
    geometry_generation: u64,
    published_generation: u64,
}

impl Core {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            route: None,
            feed: None,
            tracker: None,
            feed_channel: None,
            tracker_channel: None,
            driver: None,
            display: ManeuverDisplayState::new(),
            last_progress: None,
            geometry: None,
            geometry_generation: 0,
            published_generation: 0,
        }
    }
}

struct Shared {
    config: NavigationConfig,
    projector: Arc<dyn GeometryProjector>,
    nearest: Arc<dyn NearestPointFinder>,
    observers: ObserverSet,
    core: Mutex<Core>,
}

struct PendingGeometry {
    due: Instant,
    generation: u64,
    geometry: Arc<RouteGeometry>,
}

/// Drives one navigation along a route: feeds fixes to the tracker, turns its
/// answers into display state and tells observers about it.
///
/// Dropping the session cancels it.
pub struct RouteTrackingSession {
    shared: Arc<Shared>,
}

/// A non-owning handle, e.g. for cancelling from inside an observer.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Weak<Shared>,
}

impl SessionHandle {
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancel();
        }
    }

    pub fn state(&self) -> Option<SessionState> {
        self.shared.upgrade().map(|shared| shared.core.lock().state)
    }
}

impl RouteTrackingSession {
    pub fn new(config: NavigationConfig) -> Self {
        Self::with_geometry_engine(config, Arc::new(WebMercatorProjector), Arc::new(ClosestPointFinder))
    }

    pub fn with_geometry_engine(
        config: NavigationConfig,
        projector: Arc<dyn GeometryProjector>,
        nearest: Arc<dyn NearestPointFinder>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                projector,
                nearest,
                observers: ObserverSet::new(),
                core: Mutex::new(Core::new()),
            }),
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.shared.config
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { shared: Arc::downgrade(&self.shared) }
    }

    pub fn subscribe(&self, observer: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Subscription {
        self.shared.observers.add(observer)
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    pub fn route(&self) -> Option<Arc<Route>> {
        self.shared.core.lock().route.clone()
    }

    /// The last published remaining/traversed split, for rendering.
    pub fn route_geometry(&self) -> Option<Arc<RouteGeometry>> {
        self.shared.core.lock().geometry.clone()
    }

    /// Starts tracking `route` with fixes from `feed`.
    ///
    /// Nothing is kept when this fails. Must be called within a tokio runtime.
    pub async fn start(
        &self,
        route: Route,
        feed: impl LocationFeed + 'static,
        tracker: Arc<dyn RouteTracker>,
    ) -> Result<(), TrackingError> {
        let shared = &self.shared;
        let route = Arc::new(route);

        {
            let mut core = shared.core.lock();
            if core.state != SessionState::Idle {
                return Err(TrackingError::AlreadyStarted(core.state));
            }
            if route.maneuvers.is_empty() {
                return Err(TrackingError::EmptyRoute);
            }

            let (feed_channel, feed_sink, feed_rx) = OwnedChannel::new();
            let (tracker_channel, tracker_sink, tracker_rx) = OwnedChannel::new();

            let mut feed: Box<dyn LocationFeed> = Box::new(feed);
            feed.start(feed_sink)?;

            tracker.set_voice_guidance_unit_system(shared.config.voice_guidance_unit_system);
            tracker.set_event_sink(Some(tracker_sink));

            core.display.reset();
            core.last_progress = None;
            core.state = SessionState::Active;
            core.route = Some(route.clone());
            core.feed = Some(feed);
            core.tracker = Some(tracker.clone());
            core.feed_channel = Some(feed_channel);
            core.tracker_channel = Some(tracker_channel);
            core.driver = Some(tokio::spawn(drive(shared.clone(), feed_rx, tracker_rx)));
        }

        info!("Started navigating '{}' with {} maneuvers", route.name, route.maneuvers.len());
        shared.observers.emit(&SessionEvent::Started { route });

        // An observer of `Started` may already have torn the session down
        if shared.config.rerouting_enabled && !shared.is_completed() {
            let parameters = ReroutingParameters {
                strategy: shared.config.rerouting_strategy,
                visit_first_stop_on_start: shared.config.visit_first_stop_on_start,
            };
            if let Err(err) = tracker.enable_rerouting(parameters).await {
                warn!("Could not enable rerouting: {}", err);
            }
            if shared.is_completed() {
                tracker.disable_rerouting();
            }
        }

        Ok(())
    }

    /// Stops the feed, detaches the tracker and reports `Cancelled`. Does nothing once completed.
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl Drop for RouteTrackingSession {
    fn drop(&mut self) {
        self.shared.cancel();

        // Left running by `TeardownPolicy::KeepFeed`
        let feed = self.shared.core.lock().feed.take();
        if let Some(mut feed) = feed {
            feed.stop();
        }
    }
}

async fn drive(shared: Arc<Shared>, mut fixes: UnboundedReceiver<FeedEvent>, mut tracker_events: UnboundedReceiver<TrackerEvent>) {
    let delay = shared.config.geometry_update_delay;
    let mut pending: VecDeque<PendingGeometry> = VecDeque::new();

    loop {
        let next_due = pending.front().map(|pending| pending.due);

        tokio::select! {
            biased;

            Some(event) = tracker_events.recv() => shared.handle_tracker_event(event),
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                if let Some(due) = pending.pop_front() {
                    shared.publish_geometry(due.generation, due.geometry);
                }
            }
            Some(event) = fixes.recv() => match event {
                FeedEvent::Fix(fix) => {
                    if let Some((generation, geometry)) = shared.process_fix(fix).await {
                        pending.push_back(PendingGeometry { due: Instant::now() + delay, generation, geometry });
                    }
                }
                FeedEvent::Error(err) => shared.handle_location_error(err),
            },
            else => break,
        }

        if shared.core.lock().state == SessionState::Completed {
            break;
        }
    }

    debug!("Session driver finished");
}

impl Shared {
    fn state(&self) -> SessionState {
        self.core.lock().state
    }

    /// Returns the geometry to publish later, if any.
    async fn process_fix(&self, fix: RawFix) -> Option<(u64, Arc<RouteGeometry>)> {
        let tracker = {
            let core = self.core.lock();
            match core.state {
                SessionState::Active | SessionState::Rerouting => core.tracker.clone()?,
                _ => return None,
            }
        };

        debug!("Tracking fix at ({:.6}, {:.6})", fix.latitude(), fix.longitude());
        let snapshot = match tracker.track_location(&fix).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Dropping fix: {}", err);
                return None;
            }
        };

        let mut core = self.core.lock();
        let state = core.state;
        match state {
            SessionState::Active => {}
            SessionState::Rerouting => {
                drop(core);
                self.observers.emit(&SessionEvent::LocationUpdated { display_fix: fix });
                return None;
            }
            _ => return None,
        }

        let current = snapshot.current_maneuver_index;
        let count = snapshot.maneuvers.len();
        let display_maneuver_index = core.display.compute_display_index(current, count);
        core.last_progress = Some((current, count));

        let display_fix = snap(&fix, Some(&snapshot), self.projector.as_ref(), self.nearest.as_ref());
        let unit_system = self.config.voice_guidance_unit_system;
        let reached = snapshot.destination_reached();

        core.geometry_generation += 1;
        let generation = core.geometry_generation;
        drop(core);

        let geometry = Arc::new(RouteGeometry {
            remaining: snapshot.remaining_geometry.clone(),
            traversed: snapshot.traversed_geometry.clone(),
        });
        let update = ProgressUpdate {
            maneuver_text: format::maneuver_distance_text(snapshot.maneuver_progress.remaining_distance_m, unit_system),
            summary_text: format::summary_text(
                snapshot.route_progress.remaining_distance_m,
                snapshot.route_progress.remaining_time_s,
                unit_system,
            ),
            snapshot: Arc::new(snapshot),
            display_fix,
            display_maneuver_index,
        };

        self.observers.emit(&SessionEvent::ProgressUpdated(update));

        if reached {
            info!("Destination reached");
            self.finish(SessionEvent::DestinationReached);
            return None;
        }

        Some((generation, geometry))
    }

    fn publish_geometry(&self, generation: u64, geometry: Arc<RouteGeometry>) {
        {
            let mut core = self.core.lock();
            if core.state == SessionState::Completed || generation <= core.published_generation {
                return;
            }
            core.published_generation = generation;
            core.geometry = Some(geometry.clone());
        }

        self.observers.emit(&SessionEvent::RouteGeometryUpdated(geometry));
    }

    fn handle_tracker_event(&self, event: TrackerEvent) {
        match event {
            TrackerEvent::VoiceGuidance(guidance) => {
                let display_maneuver_index = {
                    let mut core = self.core.lock();
                    if core.state == SessionState::Completed {
                        return;
                    }
                    if guidance.kind == GuidanceKind::ApproachingManeuver {
                        core.display.on_approaching_maneuver_guidance();
                    }
                    let last_progress = core.last_progress;
                    last_progress.map(|(current, count)| core.display.compute_display_index(current, count))
                };

                debug!("Voice guidance: {}", guidance.text);
                self.observers.emit(&SessionEvent::VoiceGuidance { guidance, display_maneuver_index });
            }
            TrackerEvent::RerouteStarted => {
                {
                    let mut core = self.core.lock();
                    if core.state != SessionState::Active {
                        return;
                    }
                    core.state = SessionState::Rerouting;
                }

                info!("Rerouting");
                self.observers.emit(&SessionEvent::RerouteStarted);
            }
            TrackerEvent::RerouteCompleted(result) => {
                let mut core = self.core.lock();
                if core.state == SessionState::Completed {
                    return;
                }
                core.state = SessionState::Active;

                let new_route = match result {
                    Ok(result) => result
                        .into_first_route()
                        .ok_or_else(|| TrackerError::RerouteFailed("no route was returned".into())),
                    Err(err) => Err(err),
                };

                let event = match new_route {
                    Ok(route) => {
                        let route = Arc::new(route);
                        core.route = Some(route.clone());
                        core.display.reset();
                        core.last_progress = None;
                        info!("Rerouted onto '{}'", route.name);
                        SessionEvent::RerouteCompleted { route }
                    }
                    Err(error) => {
                        warn!("Reroute failed: {}", error);
                        SessionEvent::RerouteFailed { error }
                    }
                };
                drop(core);

                self.observers.emit(&event);
            }
        }
    }

    fn handle_location_error(&self, err: LocationError) {
        if self.state() == SessionState::Completed {
            return;
        }

        error!("Location feed error: {}", err);
        let cancel = self.config.location_error_policy == LocationErrorPolicy::CancelOnUnrecoverable && err.is_unrecoverable();
        self.observers.emit(&SessionEvent::LocationError(Arc::new(err)));

        if cancel {
            self.cancel();
        }
    }

    fn is_completed(&self) -> bool {
        self.core.lock().state == SessionState::Completed
    }

    fn cancel(&self) {
        if self.finish(SessionEvent::Cancelled) {
            info!("Navigation cancelled");
        }
    }

    /// Moves to Completed and delivers `event` as the last event. False if already completed.
    fn finish(&self, event: SessionEvent) -> bool {
        let (feed, tracker, driver) = {
            let mut core = self.core.lock();
            if core.state == SessionState::Completed {
                return false;
            }
            core.state = SessionState::Completed;

            if let Some(mut channel) = core.feed_channel.take() {
                channel.close();
            }
            if let Some(mut channel) = core.tracker_channel.take() {
                channel.close();
            }

            let feed = match self.config.teardown_policy {
                TeardownPolicy::StopFeed => core.feed.take(),
                TeardownPolicy::KeepFeed => None,
            };
            (feed, core.tracker.take(), core.driver.take())
        };

        if let Some(mut feed) = feed {
            feed.stop();
        }
        if let Some(tracker) = tracker {
            tracker.disable_rerouting();
            tracker.set_event_sink(None);
        }

        self.observers.emit_final(&event);

        if let Some(driver) = driver {
            driver.abort();
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geo_types::{line_string, Point};
    use route_tracker_lib::{
        guidance::{GuidanceKind, VoiceGuidance},
        route::{Route, RouteResult},
        units::UnitSystem,
    };

    use super::*;
    use crate::{
        test_support::{arrived_snapshot, fix_at, maneuver, snapshot_at, test_route, MockFeed, MockTracker},
        tracker::ReroutingStrategy,
    };

    type EventLog = Arc<Mutex<Vec<SessionEvent>>>;

    fn record(session: &RouteTrackingSession) -> (Subscription, EventLog) {
        let events: EventLog = Arc::default();
        let log = events.clone();
        let subscription = session.subscribe(move |event| log.lock().push(event.clone()));
        (subscription, events)
    }

    fn names(events: &EventLog) -> Vec<&'static str> {
        events
            .lock()
            .iter()
            .map(|event| match event {
                SessionEvent::Started { .. } => "started",
                SessionEvent::ProgressUpdated(_) => "progress",
                SessionEvent::LocationUpdated { .. } => "location",
                SessionEvent::RouteGeometryUpdated(_) => "geometry",
                SessionEvent::VoiceGuidance { .. } => "guidance",
                SessionEvent::RerouteStarted => "reroute_started",
                SessionEvent::RerouteCompleted { .. } => "reroute_completed",
                SessionEvent::RerouteFailed { .. } => "reroute_failed",
                SessionEvent::DestinationReached => "destination_reached",
                SessionEvent::Cancelled => "cancelled",
                SessionEvent::LocationError(_) => "location_error",
            })
            .collect()
    }

    fn progress_updates(events: &EventLog) -> Vec<ProgressUpdate> {
        events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::ProgressUpdated(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn started(config: NavigationConfig) -> (RouteTrackingSession, MockFeed, Arc<MockTracker>, Subscription, EventLog) {
        let session = RouteTrackingSession::new(config);
        let (subscription, events) = record(&session);
        let feed = MockFeed::new();
        let tracker = MockTracker::new();
        session.start(test_route(), feed.clone(), tracker.clone()).await.unwrap();
        (session, feed, tracker, subscription, events)
    }

    #[tokio::test(start_paused = true)]
    async fn start_attaches_everything() {
        let config = NavigationConfig {
            voice_guidance_unit_system: UnitSystem::Metric,
            rerouting_strategy: ReroutingStrategy::ToNextWaypoint,
            ..Default::default()
        };
        let (session, feed, tracker, _subscription, events) = started(config).await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.route().map(|route| route.name.clone()), Some("Test route".to_string()));
        assert_eq!(feed.starts(), 1);
        assert!(tracker.is_attached());
        assert_eq!(tracker.unit_system(), Some(UnitSystem::Metric));
        assert_eq!(
            tracker.rerouting_requests(),
            vec![ReroutingParameters { strategy: ReroutingStrategy::ToNextWaypoint, visit_first_stop_on_start: false }]
        );
        assert_eq!(names(&events), vec!["started"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rerouting_stays_off_when_disabled() {
        let config = NavigationConfig { rerouting_enabled: false, ..Default::default() };
        let (_session, _feed, tracker, _subscription, _events) = started(config).await;

        assert!(tracker.rerouting_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_on_started_skips_rerouting() {
        let session = RouteTrackingSession::new(NavigationConfig::default());
        let handle = session.handle();
        let _canceller = session.subscribe(move |event| {
            if matches!(event, SessionEvent::Started { .. }) {
                handle.cancel();
            }
        });
        let (_subscription, events) = record(&session);
        let feed = MockFeed::new();
        let tracker = MockTracker::new();

        session.start(test_route(), feed.clone(), tracker.clone()).await.unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert!(tracker.rerouting_requests().is_empty());
        assert!(!tracker.rerouting_active());
        assert!(!tracker.is_attached());
        assert_eq!(feed.stops(), 1);
        assert_eq!(names(&events), vec!["started", "cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_fails_without_maneuvers() {
        let session = RouteTrackingSession::new(NavigationConfig::default());
        let feed = MockFeed::new();
        let tracker = MockTracker::new();

        let result = session.start(Route::new("Empty", Vec::new(), Vec::new()), feed.clone(), tracker.clone()).await;

        assert!(matches!(result, Err(TrackingError::EmptyRoute)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(feed.starts(), 0);
        assert!(!tracker.is_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn start_fails_when_feed_fails() {
        let session = RouteTrackingSession::new(NavigationConfig::default());
        let (_subscription, events) = record(&session);
        let tracker = MockTracker::new();

        let result = session.start(test_route(), MockFeed::failing(), tracker.clone()).await;

        assert!(matches!(result, Err(TrackingError::Feed(LocationError::PermissionDenied))));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!tracker.is_attached());
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let (session, feed, tracker, _subscription, _events) = started(NavigationConfig::default()).await;

        let result = session.start(test_route(), MockFeed::new(), tracker.clone()).await;

        assert!(matches!(result, Err(TrackingError::AlreadyStarted(SessionState::Active))));
        assert_eq!(feed.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_carries_snapped_fix() {
        let (_session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        let mut snapshot = snapshot_at(2, true);
        snapshot.maneuvers[2] = maneuver("Continue north", line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 10.0)]);
        tracker.respond(Ok(snapshot));

        assert!(feed.push_fix(fix_at(1.0, 5.0)));
        settle().await;

        // The tracker always sees the raw fix
        assert_eq!(tracker.tracked()[0].position, Point::new(1.0, 5.0));

        let updates = progress_updates(&events);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].display_fix.position, Point::new(0.0, 5.0));
        assert_eq!(updates[0].display_maneuver_index, 2);
        assert_eq!(updates[0].maneuver_text, "0.3 mi.");
        assert_eq!(updates[0].summary_text, "4.2 mi ∙ 12 min");
    }

    #[tokio::test(start_paused = true)]
    async fn off_route_progress_shows_raw_fix() {
        let (_session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        tracker.respond(Ok(snapshot_at(1, false)));

        feed.push_fix(fix_at(1.5, 0.2));
        settle().await;

        assert_eq!(progress_updates(&events)[0].display_fix, fix_at(1.5, 0.2));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_fix_is_dropped() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        tracker.respond(Err(TrackerError::RejectedFix("stale".into())));

        feed.push_fix(fix_at(0.1, 0.0));
        feed.push_fix(fix_at(0.2, 0.0));
        settle().await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(tracker.tracked().len(), 2);
        assert_eq!(names(&events), vec!["started", "progress"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fixes_are_tracked_one_at_a_time_in_order() {
        let session = RouteTrackingSession::new(NavigationConfig::default());
        let feed = MockFeed::new();
        let tracker = MockTracker::with_delay(Duration::from_millis(100));
        session.start(test_route(), feed.clone(), tracker.clone()).await.unwrap();

        for x in [0.1, 0.2, 0.3] {
            feed.push_fix(fix_at(x, 0.0));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let tracked: Vec<f64> = tracker.tracked().iter().map(|fix| fix.longitude()).collect();
        assert_eq!(tracked, vec![0.1, 0.2, 0.3]);
        assert_eq!(tracker.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn geometry_is_published_after_delay() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        let remaining = SpatialGeometry::wgs84(line_string![(x: 1.0, y: 0.0), (x: 4.0, y: 0.0)]);
        tracker.respond(Ok(RouteProgressSnapshot { remaining_geometry: Some(remaining.clone()), ..snapshot_at(1, true) }));

        feed.push_fix(fix_at(1.0, 0.0));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(names(&events), vec!["started", "progress"]);
        assert!(session.route_geometry().is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(names(&events), vec!["started", "progress", "geometry"]);
        assert_eq!(session.route_geometry().and_then(|geometry| geometry.remaining.clone()), Some(remaining));
    }

    #[tokio::test(start_paused = true)]
    async fn approaching_guidance_previews_next_maneuver() {
        let (_session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        tracker.respond(Ok(snapshot_at(1, true)));
        tracker.respond(Ok(snapshot_at(1, true)));
        tracker.respond(Ok(snapshot_at(2, true)));

        feed.push_fix(fix_at(1.2, 0.0));
        settle().await;
        tracker.emit(TrackerEvent::VoiceGuidance(VoiceGuidance::new("Turn left in 500 feet", GuidanceKind::ApproachingManeuver)));
        settle().await;
        feed.push_fix(fix_at(1.6, 0.0));
        settle().await;
        feed.push_fix(fix_at(2.1, 0.0));
        settle().await;

        let guidance_index = events.lock().iter().find_map(|event| match event {
            SessionEvent::VoiceGuidance { display_maneuver_index, .. } => *display_maneuver_index,
            _ => None,
        });
        assert_eq!(guidance_index, Some(2));

        let shown: Vec<usize> = progress_updates(&events).iter().map(|update| update.display_maneuver_index).collect();
        assert_eq!(shown, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn destination_reached_stops_once() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        tracker.respond(Ok(arrived_snapshot()));

        feed.push_fix(fix_at(3.9, 0.0));
        settle().await;

        assert_eq!(names(&events), vec!["started", "progress", "destination_reached"]);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(feed.stops(), 1);
        assert!(!tracker.is_attached());

        assert!(!feed.push_fix(fix_at(4.0, 0.0)));
        session.cancel();
        settle().await;

        assert_eq!(feed.stops(), 1);
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(names(&events), vec!["started", "progress", "destination_reached"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;

        session.cancel();
        session.cancel();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(feed.stops(), 1);
        assert!(!tracker.is_attached());
        assert_eq!(names(&events), vec!["started", "cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disables_rerouting() {
        let (session, _feed, tracker, _subscription, _events) = started(NavigationConfig::default()).await;
        assert!(tracker.rerouting_active());

        session.cancel();

        assert!(!tracker.rerouting_active());
    }

    #[tokio::test(start_paused = true)]
    async fn kept_feed_runs_until_session_is_dropped() {
        let config = NavigationConfig { teardown_policy: TeardownPolicy::KeepFeed, ..Default::default() };
        let (session, feed, tracker, _subscription, events) = started(config).await;

        session.cancel();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(feed.stops(), 0);
        assert!(feed.is_started());
        assert!(!tracker.is_attached());
        // detached: fixes no longer reach the session
        assert!(!feed.push_fix(fix_at(0.5, 0.0)));
        settle().await;
        assert!(tracker.tracked().is_empty());
        assert_eq!(names(&events), vec!["started", "cancelled"]);

        drop(session);
        assert_eq!(feed.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_delivered_after_cancel() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;
        feed.push_fix(fix_at(0.5, 0.0));
        settle().await;

        session.cancel();
        assert!(!feed.push_fix(fix_at(0.6, 0.0)));
        assert!(!tracker.emit(TrackerEvent::RerouteStarted));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(names(&events), vec!["started", "progress", "cancelled"]);
        assert_eq!(tracker.tracked().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reroute_keeps_route() {
        let (session, _feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;

        tracker.emit(TrackerEvent::RerouteStarted);
        settle().await;
        assert_eq!(session.state(), SessionState::Rerouting);

        tracker.emit(TrackerEvent::RerouteCompleted(Err(TrackerError::RerouteFailed("no network".into()))));
        settle().await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.route().map(|route| route.name.clone()), Some("Test route".to_string()));
        assert_eq!(names(&events), vec!["started", "reroute_started", "reroute_failed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reroute_result_is_a_failure() {
        let (session, _feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;

        tracker.emit(TrackerEvent::RerouteStarted);
        tracker.emit(TrackerEvent::RerouteCompleted(Ok(RouteResult::default())));
        settle().await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(names(&events), vec!["started", "reroute_started", "reroute_failed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reroute_replaces_route() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;

        tracker.emit(TrackerEvent::RerouteStarted);
        settle().await;
        feed.push_fix(fix_at(0.5, 0.3));
        settle().await;

        let detour = Route::new("Detour", Vec::new(), vec![maneuver("Turn around", line_string![(x: 0.5, y: 0.3), (x: 0.5, y: 0.0)])]);
        tracker.emit(TrackerEvent::RerouteCompleted(Ok(RouteResult::new(vec![detour]))));
        settle().await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.route().map(|route| route.name.clone()), Some("Detour".to_string()));
        assert_eq!(names(&events), vec!["started", "reroute_started", "location", "reroute_completed"]);

        let location = events.lock().iter().find_map(|event| match event {
            SessionEvent::LocationUpdated { display_fix } => Some(*display_fix),
            _ => None,
        });
        assert_eq!(location, Some(fix_at(0.5, 0.3)));
    }

    #[tokio::test(start_paused = true)]
    async fn location_errors_keep_session_alive_by_default() {
        let (session, feed, _tracker, _subscription, events) = started(NavigationConfig::default()).await;

        feed.push_error(LocationError::PermissionDenied);
        settle().await;

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(names(&events), vec!["started", "location_error"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_error_cancels_when_configured() {
        let config = NavigationConfig { location_error_policy: LocationErrorPolicy::CancelOnUnrecoverable, ..Default::default() };
        let (session, feed, _tracker, _subscription, events) = started(config).await;

        feed.push_error(LocationError::HardwareUnavailable("antenna".into()));
        settle().await;
        assert_eq!(session.state(), SessionState::Active);

        feed.push_error(LocationError::PermissionDenied);
        settle().await;

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(feed.stops(), 1);
        assert_eq!(names(&events), vec!["started", "location_error", "location_error", "cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_can_cancel_mid_delivery() {
        let session = RouteTrackingSession::new(NavigationConfig::default());
        let handle = session.handle();
        let _canceller = session.subscribe(move |event| {
            if matches!(event, SessionEvent::ProgressUpdated(_)) {
                handle.cancel();
            }
        });
        let (_subscription, events) = record(&session);
        let feed = MockFeed::new();
        session.start(test_route(), feed.clone(), MockTracker::new()).await.unwrap();

        feed.push_fix(fix_at(0.5, 0.0));
        feed.push_fix(fix_at(0.6, 0.0));
        settle().await;

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(feed.stops(), 1);
        assert_eq!(names(&events), vec!["started", "cancelled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn disposed_observer_hears_nothing() {
        let (session, feed, _tracker, subscription, events) = started(NavigationConfig::default()).await;

        subscription.dispose();
        feed.push_fix(fix_at(0.5, 0.0));
        settle().await;
        session.cancel();

        assert_eq!(names(&events), vec!["started"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_session_stops_feed() {
        let (session, feed, tracker, _subscription, events) = started(NavigationConfig::default()).await;

        drop(session);

        assert_eq!(feed.stops(), 1);
        assert!(!tracker.is_attached());
        assert_eq!(names(&events), vec!["started", "cancelled"]);
    }
}
