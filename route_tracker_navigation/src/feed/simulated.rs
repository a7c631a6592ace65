use std::{sync::Arc, time::Duration};

use route_tracker_lib::fix::RawFix;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::{FeedSink, LocationFeed};
use crate::{gpx_util, LocationError, NavigationConfig};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Replays a recorded track at a fixed cadence.
///
/// Every `start` replays from the first fix. Must be started from within a tokio runtime.
/// Intervals shorter than a millisecond are raised to one.
pub struct SimulatedFeed {
    track: Arc<[RawFix]>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl SimulatedFeed {
    pub fn new(track: Vec<RawFix>, interval: Duration) -> Self {
        Self {
            track: track.into(),
            interval: interval.max(MIN_INTERVAL),
            task: None,
        }
    }

    pub fn from_recording(path: impl AsRef<std::path::Path>, interval: Duration) -> Result<Self, LocationError> {
        Ok(Self::new(gpx_util::read_recording(path)?, interval))
    }

    /// The configured recording, or `None` when GPS simulation is off.
    pub fn from_config(config: &NavigationConfig) -> Result<Option<Self>, LocationError> {
        let Some(path) = config.simulation_track_path() else {
            return Ok(None);
        };

        tracing::info!("Simulating GPS from {:?}", path);
        Self::from_recording(path, config.simulation_interval).map(Some)
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

impl LocationFeed for SimulatedFeed {
    fn start(&mut self, sink: FeedSink) -> Result<(), LocationError> {
        if self.is_started() {
            return Ok(());
        }

        let track = self.track.clone();
        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for fix in track.iter() {
                ticker.tick().await;
                if !sink.on_fix(*fix) {
                    return;
                }
            }

            tracing::debug!("Simulated track finished after {} fixes", track.len());
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_started(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SimulatedFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
