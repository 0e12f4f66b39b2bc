//! In-process change feed
//!
//! The backend publishes committed row changes here; each subscriber sees
//! the global streams plus the city-scoped streams of its own chamber.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use super::event::ChangeEvent;

/// Messages buffered per subscriber before it is considered lagging
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// Chamber bell rung by the chair
    Bell { city: String, at: DateTime<Utc> },
}

impl FeedMessage {
    fn visible_to(&self, city: &str) -> bool {
        match self {
            FeedMessage::Change(event) => {
                !event.table.is_city_scoped() || event.city.as_deref() == Some(city)
            }
            FeedMessage::Bell { city: bell_city, .. } => bell_city == city,
        }
    }
}

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Message(FeedMessage),
    /// Messages were dropped; the subscriber must refetch its baseline
    Lagged(u64),
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<FeedMessage>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, message: FeedMessage) {
        // No subscribers is not an error
        if self.tx.send(message).is_err() {
            debug!("Change published with no subscribers");
        }
    }

    pub fn subscribe(&self, city: impl Into<String>) -> Subscription {
        Subscription {
            city: city.into(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A city-scoped view of the feed
pub struct Subscription {
    city: String,
    rx: broadcast::Receiver<FeedMessage>,
}

impl Subscription {
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Wait for the next message for this chamber; `None` once the feed is gone
    pub async fn recv(&mut self) -> Option<FeedItem> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.visible_to(&self.city) => return Some(FeedItem::Message(msg)),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!(city = %self.city, skipped = n, "Change feed subscriber lagged");
                    return Some(FeedItem::Lagged(n));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll
    pub fn try_recv(&mut self) -> Option<FeedItem> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) if msg.visible_to(&self.city) => return Some(FeedItem::Message(msg)),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => return Some(FeedItem::Lagged(n)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<FeedItem> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
