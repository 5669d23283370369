//! Event fan-out to connected viewers.
//!
//! Every telemetry event is delivered, in listener order, to every viewer
//! connected at the time it is published. Viewers that fall behind by
//! more than the channel capacity receive
//! [`broadcast::error::RecvError::Lagged`] and resume from the newest
//! event; one slow viewer never holds up the others or the listener.

use marketsim_protocol::ClientEvent;
use tokio::sync::broadcast;

/// Broadcast hub for [`ClientEvent`]s.
#[derive(Debug, Clone)]
pub struct EventFanout {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventFanout {
    /// Create a hub buffering up to `capacity` events per viewer.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a viewer. The receiver sees only events published after
    /// this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to every registered viewer.
    ///
    /// Returns the number of viewers it was queued for; zero when nobody
    /// is connected, which is not an error.
    pub fn publish(&self, event: ClientEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of currently registered viewers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(price: f64) -> ClientEvent {
        ClientEvent::MarketData { price, volume: 1 }
    }

    #[tokio::test]
    async fn publish_without_viewers_is_not_an_error() {
        let fanout = EventFanout::new(8);
        assert_eq!(fanout.publish(market(1.0)), 0);
        assert_eq!(fanout.receiver_count(), 0);
    }

    #[tokio::test]
    async fn every_viewer_sees_events_in_order() {
        let fanout = EventFanout::new(8);
        let mut a = fanout.subscribe();
        let mut b = fanout.subscribe();

        assert_eq!(fanout.publish(market(1.0)), 2);
        assert_eq!(fanout.publish(market(2.0)), 2);

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.ok(), Some(market(1.0)));
            assert_eq!(rx.recv().await.ok(), Some(market(2.0)));
        }
    }

    #[tokio::test]
    async fn late_viewers_miss_earlier_events() {
        let fanout = EventFanout::new(8);
        let _early = fanout.subscribe();
        fanout.publish(market(1.0));

        let mut late = fanout.subscribe();
        fanout.publish(market(2.0));
        assert_eq!(late.recv().await.ok(), Some(market(2.0)));
    }

    #[tokio::test]
    async fn lagging_viewer_skips_ahead() {
        let fanout = EventFanout::new(2);
        let mut slow = fanout.subscribe();
        for i in 0..5 {
            fanout.publish(market(f64::from(i)));
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(slow.recv().await.ok(), Some(market(3.0)));
        assert_eq!(slow.recv().await.ok(), Some(market(4.0)));
    }

    #[tokio::test]
    async fn dropped_viewer_is_unregistered() {
        let fanout = EventFanout::new(4);
        let rx = fanout.subscribe();
        assert_eq!(fanout.receiver_count(), 1);
        drop(rx);
        assert_eq!(fanout.receiver_count(), 0);
    }
}
