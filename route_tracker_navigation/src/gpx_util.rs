use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use route_tracker_lib::fix::RawFix;

use crate::LocationError;

/// Assumed accuracy of recorded points without HDOP.
const DEFAULT_RECORDED_ACCURACY_M: f64 = 5.0;

/// Reads every track point of a GPX file as a fix, in file order.
///
/// Points without a time are stamped one second after the previous point.
pub fn read_recording(path: impl AsRef<Path>) -> Result<Vec<RawFix>, LocationError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|err| LocationError::Recording(format!("Failed to open recording {:?}: {}", path, err)))?;
    let gpx = gpx::read(std::io::BufReader::new(file))
        .map_err(|err| LocationError::Recording(format!("Failed to parse recording {:?}: {}", path, err)))?;

    let mut previous: Option<DateTime<Utc>> = None;
    let mut fixes = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let timestamp = point.time
                    .and_then(|time| time.format().ok())
                    .and_then(|time| DateTime::parse_from_rfc3339(&time).ok())
                    .map(|time| time.with_timezone(&Utc))
                    .or_else(|| previous.map(|previous| previous + TimeDelta::seconds(1)))
                    .unwrap_or(DateTime::UNIX_EPOCH);
                previous = Some(timestamp);

                fixes.push(RawFix {
                    position: point.point(),
                    altitude: point.elevation,
                    horizontal_accuracy: point.hdop.map(|hdop| hdop * DEFAULT_RECORDED_ACCURACY_M).unwrap_or(DEFAULT_RECORDED_ACCURACY_M),
                    vertical_accuracy: point.vdop.map(|vdop| vdop * DEFAULT_RECORDED_ACCURACY_M),
                    course: None,
                    speed: point.speed,
                    timestamp,
                });
            }
        }
    }

    if fixes.is_empty() {
        return Err(LocationError::Recording(format!("Recording {:?} has no track points", path)));
    }

    Ok(fixes)
}

#[cfg(test)]
pub(crate) const TEST_RECORDING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route_tracker" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>home2park</name>
    <trkseg>
      <trkpt lat="56.1500" lon="10.2000"><ele>12.0</ele><time>2024-05-17T08:00:00Z</time></trkpt>
      <trkpt lat="56.1510" lon="10.2000"><ele>12.5</ele><time>2024-05-17T08:00:01Z</time></trkpt>
      <trkpt lat="56.1520" lon="10.2000"></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

#[test]
fn reads_track_points_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("home2park.gpx");
    std::fs::write(&path, TEST_RECORDING).unwrap();

    let fixes = read_recording(&path).unwrap();

    assert_eq!(fixes.len(), 3);
    assert_eq!(fixes[0].latitude(), 56.15);
    assert_eq!(fixes[0].altitude, Some(12.0));
    assert_eq!(fixes[1].timestamp - fixes[0].timestamp, TimeDelta::seconds(1));
    // untimed point follows the previous one
    assert_eq!(fixes[2].timestamp - fixes[1].timestamp, TimeDelta::seconds(1));
    assert!(fixes.iter().all(|fix| fix.is_valid()));
}

#[test]
fn missing_recording_is_a_recording_error() {
    let err = read_recording("does/not/exist.gpx").unwrap_err();
    assert!(matches!(err, LocationError::Recording(_)));
    assert!(err.is_unrecoverable());
}
