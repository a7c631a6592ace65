#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{route::Maneuver, spatial::SpatialGeometry};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationStatus {
    #[default]
    NotReached,
    Approaching,
    Reached,
}

/// Remaining distance and time towards some target (next maneuver or destination).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingProgress {
    pub remaining_distance_m: f64,
    pub remaining_time_s: f64,
    pub traversed_distance_m: f64,
}

/// The tracker's view of the route for one fix.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteProgressSnapshot {
    pub on_route: bool,
    pub current_maneuver_index: usize,
    pub maneuvers: Vec<Maneuver>,
    pub remaining_geometry: Option<SpatialGeometry>,
    pub traversed_geometry: Option<SpatialGeometry>,
    pub maneuver_progress: TrackingProgress,
    pub route_progress: TrackingProgress,
    pub destination_status: DestinationStatus,
}

impl RouteProgressSnapshot {
    pub fn current_maneuver(&self) -> Option<&Maneuver> {
        self.maneuvers.get(self.current_maneuver_index)
    }

    pub fn destination_reached(&self) -> bool {
        self.destination_status == DestinationStatus::Reached
    }
}
