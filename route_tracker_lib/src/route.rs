use geo_types::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::spatial::SpatialGeometry;

/// One turn/instruction segment of a route.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Maneuver {
    pub text: String,
    pub geometry: Option<SpatialGeometry>,
    pub length_m: f64,
    pub duration_s: f64,
}

impl Maneuver {
    pub fn new(text: impl Into<String>, geometry: Option<SpatialGeometry>) -> Self {
        Self {
            text: text.into(),
            geometry,
            length_m: 0.0,
            duration_s: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub name: String,
    pub position: Point,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub stops: Vec<Stop>,
    pub maneuvers: Vec<Maneuver>,
    pub geometry: Option<SpatialGeometry>,
    pub total_length_m: f64,
    pub total_time_s: f64,
}

impl Route {
    pub fn new(name: impl Into<String>, stops: Vec<Stop>, maneuvers: Vec<Maneuver>) -> Self {
        let total_length_m = maneuvers.iter().map(|m| m.length_m).sum();
        let total_time_s = maneuvers.iter().map(|m| m.duration_s).sum();
        Self {
            name: name.into(),
            stops,
            maneuvers,
            geometry: None,
            total_length_m,
            total_time_s,
        }
    }

    pub fn with_geometry(mut self, geometry: SpatialGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn destination(&self) -> Option<&Stop> {
        self.stops.last()
    }
}

/// The solved routes for one request. Navigation always follows the first one.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteResult {
    pub routes: Vec<Route>,
}

impl RouteResult {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn first_route(&self) -> Option<&Route> {
        self.routes.first()
    }

    pub fn into_first_route(self) -> Option<Route> {
        self.routes.into_iter().next()
    }
}

#[test]
fn route_totals_sum_maneuvers() {
    let maneuvers = vec![
        Maneuver { length_m: 120.0, duration_s: 10.0, ..Maneuver::new("Start", None) },
        Maneuver { length_m: 380.0, duration_s: 32.0, ..Maneuver::new("Turn left", None) },
        Maneuver::new("Arrive", None),
    ];
    let route = Route::new("Home to park", Vec::new(), maneuvers);

    assert_eq!(route.total_length_m, 500.0);
    assert_eq!(route.total_time_s, 42.0);
    assert!(route.destination().is_none());
}
