use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};

/// Non-owning sending half handed to collaborators (feeds, trackers).
///
/// The session keeps the only strong sender. Once it drops it, every `send`
/// here is discarded, so a collaborator that outlives the session cannot
/// deliver into it.
pub struct WeakSink<T> {
    tx: WeakUnboundedSender<T>,
}

impl<T> Clone for WeakSink<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> WeakSink<T> {
    /// Returns false if the receiving session is gone.
    pub fn send(&self, value: T) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.tx.upgrade().is_some_and(|tx| !tx.is_closed())
    }
}

/// The only strong sender of a channel, kept by its owner.
pub(crate) struct OwnedChannel<T> {
    tx: Option<UnboundedSender<T>>,
}

impl<T> OwnedChannel<T> {
    /// The owned end, a first weak sink for the producer, and the receiver.
    pub(crate) fn new() -> (Self, WeakSink<T>, UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = WeakSink { tx: tx.downgrade() };
        (Self { tx: Some(tx) }, sink, rx)
    }

    /// Drops the strong sender. Outstanding weak sinks stop delivering immediately.
    pub(crate) fn close(&mut self) {
        self.tx.take();
    }
}

#[cfg(test)]
pub(crate) fn detached_sink<T>() -> (WeakSink<T>, UnboundedReceiver<T>, UnboundedSender<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WeakSink { tx: tx.downgrade() }, rx, tx)
}

#[test]
fn weak_sink_stops_after_owner_closes() {
    let (mut channel, sink, mut rx) = OwnedChannel::new();

    assert!(sink.send(1));
    channel.close();
    assert!(!sink.send(2));
    assert!(!sink.is_connected());

    assert_eq!(rx.try_recv().ok(), Some(1));
    assert!(rx.try_recv().is_err());
}
