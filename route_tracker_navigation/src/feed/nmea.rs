use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use geo_types::Point;
use nmea::{sentences::FixType, ParseResult};
use route_tracker_lib::fix::RawFix;
use tokio::{io::{AsyncBufReadExt, AsyncRead, BufReader}, net::TcpStream, task::JoinHandle};

use super::{FeedSink, LocationProvider};
use crate::LocationError;

const KNOTS_TO_MPS: f64 = 0.514_444;
// Rough user range error used to turn HDOP into meters
const UERE_M: f64 = 5.0;

/// Where NMEA 0183 sentences are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmeaSource {
    /// A TCP endpoint streaming raw sentences (gpsd raw mode, a GNSS bridge).
    Tcp(String),
    /// A serial device or a sentence log.
    File(PathBuf),
}

/// Turns a stream of GGA/VTG sentences into fixes. One fix per GGA, with
/// speed and course from the latest VTG.
#[derive(Debug, Default)]
pub struct NmeaFixAssembler {
    speed_knots: Option<f32>,
    course: Option<f32>,
}

impl NmeaFixAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one sentence. `date` is used for the fix timestamp, GGA only carries the time of day.
    pub fn push(&mut self, sentence: &str, date: NaiveDate) -> Option<RawFix> {
        match nmea::parse_str(sentence) {
            Ok(ParseResult::VTG(vtg)) => {
                self.speed_knots = vtg.speed_over_ground;
                self.course = vtg.true_course;
                None
            },
            Ok(ParseResult::GGA(gga)) => {
                if matches!(gga.fix_type, None | Some(FixType::Invalid)) {
                    return None;
                }

                let latitude = gga.latitude?;
                let longitude = gga.longitude?;
                let timestamp = date.and_time(gga.fix_time?).and_utc();

                Some(RawFix {
                    position: Point::new(longitude, latitude),
                    altitude: gga.altitude.map(f64::from),
                    horizontal_accuracy: gga.hdop.map(|hdop| hdop as f64 * UERE_M).unwrap_or(-1.0),
                    vertical_accuracy: None,
                    course: self.course.map(f64::from),
                    speed: self.speed_knots.map(|knots| knots as f64 * KNOTS_TO_MPS),
                    timestamp,
                })
            },
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("Failed to parse sentence {:?}: {}", sentence, err);
                None
            },
        }
    }
}

/// Live provider reading NMEA sentences from a [`NmeaSource`].
pub struct NmeaProvider {
    source: NmeaSource,
    task: Option<JoinHandle<()>>,
}

impl NmeaProvider {
    pub fn new(source: NmeaSource) -> Self {
        Self {
            source,
            task: None,
        }
    }
}

impl LocationProvider for NmeaProvider {
    fn start_updates(&mut self, sink: FeedSink) -> Result<(), LocationError> {
        if self.task.is_some() {
            return Ok(());
        }

        let source = self.source.clone();
        self.task = Some(tokio::spawn(async move {
            let result = match &source {
                NmeaSource::Tcp(address) => match TcpStream::connect(address).await {
                    Ok(stream) => read_sentences(stream, &sink).await,
                    Err(err) => Err(err),
                },
                NmeaSource::File(path) => match tokio::fs::File::open(path).await {
                    Ok(file) => read_sentences(file, &sink).await,
                    Err(err) => Err(err),
                },
            };

            match result {
                Ok(()) => {
                    sink.on_error(LocationError::HardwareUnavailable(format!("{:?} ended", source)));
                },
                Err(err) => {
                    tracing::error!("NMEA source {:?} failed: {}", source, err);
                    sink.on_error(LocationError::Io(err));
                },
            }
        }));

        Ok(())
    }

    fn stop_updates(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for NmeaProvider {
    fn drop(&mut self) {
        self.stop_updates();
    }
}

async fn read_sentences(reader: impl AsyncRead + Unpin, sink: &FeedSink) -> std::io::Result<()> {
    let mut lines = BufReader::new(reader).lines();
    let mut assembler = NmeaFixAssembler::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(fix) = assembler.push(line, Utc::now().date_naive()) {
            if !sink.on_fix(fix) {
                // Nobody is listening anymore
                return Ok(());
            }
        }
    }

    Ok(())
}
