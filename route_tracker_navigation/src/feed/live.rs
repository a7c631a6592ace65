use tokio::task::JoinHandle;

use super::{FeedEvent, FeedSink, LocationFeed};
use crate::{channel::OwnedChannel, LocationError};

/// Platform side of a live feed: turns hardware updates on and off.
pub trait LocationProvider: Send {
    fn start_updates(&mut self, sink: FeedSink) -> Result<(), LocationError>;

    fn stop_updates(&mut self);
}

/// Live GPS feed over a [`LocationProvider`].
///
/// Fixes with a negative horizontal accuracy are dropped before they reach
/// the session. Must be started from within a tokio runtime.
pub struct LiveFeed<P: LocationProvider> {
    provider: P,
    relay: Option<Relay>,
}

struct Relay {
    channel: OwnedChannel<FeedEvent>,
    task: JoinHandle<()>,
}

impl<P: LocationProvider> LiveFeed<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            relay: None,
        }
    }
}

impl<P: LocationProvider> LocationFeed for LiveFeed<P> {
    fn start(&mut self, sink: FeedSink) -> Result<(), LocationError> {
        if self.relay.is_some() {
            return Ok(());
        }

        let (channel, provider_sink, mut rx) = OwnedChannel::new();

        self.provider.start_updates(provider_sink)?;

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let delivered = match event {
                    FeedEvent::Fix(fix) if !fix.is_valid() => {
                        tracing::debug!("Dropping invalid fix (accuracy {})", fix.horizontal_accuracy);
                        continue;
                    },
                    event => sink.send(event),
                };

                if !delivered {
                    break;
                }
            }
        });

        tracing::info!("Live location feed started");
        self.relay = Some(Relay { channel, task });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut relay) = self.relay.take() else {
            return;
        };

        self.provider.stop_updates();
        relay.channel.close();
        relay.task.abort();
        tracing::info!("Live location feed stopped");
    }

    fn is_started(&self) -> bool {
        self.relay.is_some()
    }
}

impl<P: LocationProvider> Drop for LiveFeed<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
