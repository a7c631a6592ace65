use std::str::FromStr;

use async_trait::async_trait;
use route_tracker_lib::{fix::RawFix, guidance::VoiceGuidance, progress::RouteProgressSnapshot, route::RouteResult, units::UnitSystem};

use crate::{channel::WeakSink, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReroutingStrategy {
    #[default]
    ToNextStop,
    ToNextWaypoint,
    StopReturning,
}

impl FromStr for ReroutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_next_stop" => Ok(ReroutingStrategy::ToNextStop),
            "to_next_waypoint" => Ok(ReroutingStrategy::ToNextWaypoint),
            "stop_returning" => Ok(ReroutingStrategy::StopReturning),
            other => Err(format!("Unknown rerouting strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReroutingParameters {
    pub strategy: ReroutingStrategy,
    pub visit_first_stop_on_start: bool,
}

/// Everything a tracker reports outside of the per-fix progress result.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    VoiceGuidance(VoiceGuidance),
    RerouteStarted,
    /// The routes of a finished reroute, or why it failed.
    RerouteCompleted(Result<RouteResult, TrackerError>),
}

pub type TrackerEventSink = WeakSink<TrackerEvent>;

/// A route-progress tracker: the routing engine side of navigation.
///
/// Implementations must accept fixes in order; the session never calls
/// `track_location` concurrently.
#[async_trait]
pub trait RouteTracker: Send + Sync {
    async fn track_location(&self, fix: &RawFix) -> Result<RouteProgressSnapshot, TrackerError>;

    /// Attach (`Some`) or detach (`None`) the receiver of guidance and reroute events.
    fn set_event_sink(&self, sink: Option<TrackerEventSink>);

    async fn enable_rerouting(&self, parameters: ReroutingParameters) -> Result<(), TrackerError>;

    fn disable_rerouting(&self);

    fn set_voice_guidance_unit_system(&self, unit_system: UnitSystem);
}
