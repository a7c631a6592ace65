mod live;
mod nmea;
mod simulated;

pub use live::{LiveFeed, LocationProvider};
pub use nmea::{NmeaFixAssembler, NmeaProvider, NmeaSource};
pub use simulated::SimulatedFeed;

use route_tracker_lib::fix::RawFix;

use crate::{channel::WeakSink, LocationError};

pub enum FeedEvent {
    Fix(RawFix),
    Error(LocationError),
}

/// Where a feed delivers its fixes. Holds only a weak handle to the receiving session.
pub type FeedSink = WeakSink<FeedEvent>;

impl WeakSink<FeedEvent> {
    pub fn on_fix(&self, fix: RawFix) -> bool {
        self.send(FeedEvent::Fix(fix))
    }

    pub fn on_error(&self, error: LocationError) -> bool {
        self.send(FeedEvent::Error(error))
    }
}

/// A start/stop source of raw fixes.
///
/// `start` on a started feed is a no-op. After `stop` returns the feed must not
/// deliver anything more to the sink it was started with. Implementations that
/// hold hardware release it in `stop`, and stop themselves on drop.
pub trait LocationFeed: Send {
    fn start(&mut self, sink: FeedSink) -> Result<(), LocationError>;

    fn stop(&mut self);

    fn is_started(&self) -> bool;
}

impl<F: LocationFeed + ?Sized> LocationFeed for Box<F> {
    fn start(&mut self, sink: FeedSink) -> Result<(), LocationError> {
        (**self).start(sink)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_started(&self) -> bool {
        (**self).is_started()
    }
}
