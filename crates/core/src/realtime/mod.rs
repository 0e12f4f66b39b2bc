//! Realtime change streams
//!
//! Event types pushed by the backend and the feed that carries them.
//! Applying events to local state lives in [`crate::store`].

mod event;
mod feed;

pub use event::{Change, ChangeEvent, ChangeKind, Table};
pub use feed::{ChangeFeed, FeedItem, FeedMessage, Subscription};

use crate::models::{BillId, ParticipantId};

/// State-changed notifications for observers of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The bill on the floor changed; `navigate_to_session` is set when a
    /// new bill went active and session views should come to the front
    ActiveBillChanged {
        from: Option<BillId>,
        to: Option<BillId>,
        navigate_to_session: bool,
    },
    SpeakerChanged {
        from: Option<ParticipantId>,
        to: Option<ParticipantId>,
    },
    /// A fresh start time arrived; the speaking clock was recomputed
    SpeakerClockResync { elapsed_secs: i64 },
    VotingOpened(BillId),
    SessionClosed(BillId),
    RosterChanged,
    BillsChanged,
    ChambersChanged,
    HistoryAppended,
    BellRang,
    /// The change stream dropped events and a baseline refetch is required
    ResyncRequired,
}
