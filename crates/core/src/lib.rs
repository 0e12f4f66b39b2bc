//! Plenario Core Library
//!
//! Session state, voting rules, floor control, permissions, realtime
//! reconciliation and storage for municipal chamber sessions.

pub mod access;
pub mod error;
pub mod floor;
pub mod invariants;
pub mod lifecycle;
pub mod models;
pub mod permissions;
pub mod realtime;
pub mod session;
pub mod speech;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tally;

pub use access::AccessPolicy;
pub use error::{Error, Result};
pub use floor::{floor_queue, resolve_request, FloorEntry};
pub use lifecycle::{PhaseChange, SessionClosure, SessionPhase};
pub use models::*;
pub use permissions::*;
pub use realtime::{ChangeEvent, ChangeFeed, ChangeKind, FeedItem, Notification, Subscription};
pub use session::{Command, ProfileUpdate, SessionController, SignIn};
pub use speech::{SpeakingClock, SpeechState, EXTRA_TIME_SECS, SPEAKING_CEILING_SECS};
pub use stats::{DashboardStats, VotingRecord};
pub use storage::{
    Backend, BillRepository, ChamberRepository, ChangeSource, Database, HistoryRepository,
    ParticipantRepository, SessionRepository,
};
pub use store::SessionStore;
pub use tally::Tally;
