use chrono::{DateTime, Utc};
use geo_types::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single position sample as delivered by a location feed.
///
/// `position` is WGS84 with x = longitude and y = latitude. A negative
/// `horizontal_accuracy` marks the fix as invalid.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub position: Point,
    pub altitude: Option<f64>,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: Option<f64>,
    pub course: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl RawFix {
    pub fn new(position: Point, horizontal_accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position,
            altitude: None,
            horizontal_accuracy,
            vertical_accuracy: None,
            course: None,
            speed: None,
            timestamp,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }

    pub fn is_valid(&self) -> bool {
        self.horizontal_accuracy >= 0.0
    }

    /// Same fix moved to `position`. Everything else is kept as measured.
    pub fn with_position(&self, position: Point) -> Self {
        Self {
            position,
            ..*self
        }
    }
}

#[test]
fn with_position_only_moves_coordinate() {
    let timestamp = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let fix = RawFix {
        altitude: Some(12.5),
        vertical_accuracy: Some(3.0),
        course: Some(90.0),
        speed: Some(13.4),
        ..RawFix::new(Point::new(10.2, 56.1), 4.0, timestamp)
    };

    let moved = fix.with_position(Point::new(10.3, 56.2));

    assert_eq!(moved.position, Point::new(10.3, 56.2));
    assert_eq!(moved.altitude, fix.altitude);
    assert_eq!(moved.horizontal_accuracy, fix.horizontal_accuracy);
    assert_eq!(moved.vertical_accuracy, fix.vertical_accuracy);
    assert_eq!(moved.course, fix.course);
    assert_eq!(moved.speed, fix.speed);
    assert_eq!(moved.timestamp, fix.timestamp);
}
