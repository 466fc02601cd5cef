use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-listing broadcast of committed events, so a calendar view can
/// refresh its blocked dates.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a listing. Creates the channel if needed.
    pub fn subscribe(&self, listing_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(listing_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, listing_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&listing_id) {
            let _ = sender.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let listing = listing_with_price(100);
        let mut rx = hub.subscribe(listing.id);

        let event = Event::ReservationCreated {
            reservation: reservation(listing.id, day(2024, 1, 1), day(2024, 1, 3)),
        };
        hub.send(listing.id, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let listing = listing_with_price(100);
        hub.send(listing.id, &Event::ListingCreated { listing: listing.clone() });
    }
}
