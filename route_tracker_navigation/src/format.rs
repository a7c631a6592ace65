use route_tracker_lib::units::UnitSystem;

const METERS_PER_MILE: f64 = 1609.344;
const FEET_PER_METER: f64 = 3.280_84;

/// A distance as the value and unit abbreviation a navigation banner shows.
pub fn display_distance(meters: f64, unit_system: UnitSystem) -> (String, &'static str) {
    let meters = meters.max(0.0);
    match unit_system {
        UnitSystem::Imperial => {
            let miles = meters / METERS_PER_MILE;
            if miles >= 10.0 {
                (format!("{:.0}", miles), "mi")
            } else if miles >= 0.1 {
                (format!("{:.1}", miles), "mi")
            } else {
                (format!("{}", round_to_ten(meters * FEET_PER_METER)), "ft")
            }
        }
        UnitSystem::Metric => {
            if meters >= 10_000.0 {
                (format!("{:.0}", meters / 1000.0), "km")
            } else if meters >= 1000.0 {
                (format!("{:.1}", meters / 1000.0), "km")
            } else {
                (format!("{}", round_to_ten(meters)), "m")
            }
        }
    }
}

fn round_to_ten(value: f64) -> i64 {
    (value / 10.0).round() as i64 * 10
}

/// Distance to the next maneuver, e.g. `"0.3 mi."`.
pub fn maneuver_distance_text(meters: f64, unit_system: UnitSystem) -> String {
    let (value, unit) = display_distance(meters, unit_system);
    format!("{} {}.", value, unit)
}

/// Remaining distance and time to the destination, e.g. `"4.2 mi ∙ 12 min"`.
pub fn summary_text(meters: f64, seconds: f64, unit_system: UnitSystem) -> String {
    let (value, unit) = display_distance(meters, unit_system);
    format!("{} {} ∙ {}", value, unit, duration_text(seconds))
}

pub fn duration_text(seconds: f64) -> String {
    let total_minutes = (seconds.max(0.0) / 60.0).round() as u64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    match (hours, minutes) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} hr", h),
        (h, m) => format!("{} hr, {} min", h, m),
    }
}

#[test]
fn imperial_distances() {
    assert_eq!(maneuver_distance_text(482.8, UnitSystem::Imperial), "0.3 mi.");
    assert_eq!(maneuver_distance_text(76.0, UnitSystem::Imperial), "250 ft.");
    assert_eq!(maneuver_distance_text(20_000.0, UnitSystem::Imperial), "12 mi.");
}

#[test]
fn metric_distances() {
    assert_eq!(maneuver_distance_text(1234.0, UnitSystem::Metric), "1.2 km.");
    assert_eq!(maneuver_distance_text(83.0, UnitSystem::Metric), "80 m.");
    assert_eq!(maneuver_distance_text(-5.0, UnitSystem::Metric), "0 m.");
}

#[test]
fn summary_combines_distance_and_duration() {
    assert_eq!(summary_text(6759.0, 720.0, UnitSystem::Imperial), "4.2 mi ∙ 12 min");
    assert_eq!(summary_text(95_000.0, 3900.0, UnitSystem::Metric), "95 km ∙ 1 hr, 5 min");
    assert_eq!(duration_text(7200.0), "2 hr");
}
