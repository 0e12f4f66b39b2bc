//! Backend repository traits
//!
//! These traits define what the session core needs from the persistence
//! and realtime service, allowing for different implementations (SQLite,
//! mock, a hosted backend). Every write returns the row as stored, with
//! the backend's `updated_at` stamp.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::lifecycle::SessionClosure;
use crate::models::{
    Bill, BillId, BillStatus, ChamberConfig, Participant, ParticipantId, SessionHistory, VoteValue,
};
use crate::realtime::Subscription;

/// Partial update of a chamber config row; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChamberPatch {
    pub allowed_ip: Option<String>,
    pub is_active: Option<bool>,
    pub active_bill_id: Option<Option<BillId>>,
    pub is_voting_open: Option<bool>,
    /// Speaker and start time always move together
    pub active_speaker: Option<Option<(ParticipantId, DateTime<Utc>)>>,
}

impl ChamberPatch {
    pub fn apply_to(&self, config: &mut ChamberConfig) {
        if let Some(ip) = &self.allowed_ip {
            config.allowed_ip = ip.clone();
        }
        if let Some(active) = self.is_active {
            config.is_active = active;
        }
        if let Some(bill) = &self.active_bill_id {
            config.active_bill_id = bill.clone();
        }
        if let Some(open) = self.is_voting_open {
            config.is_voting_open = open;
        }
        if let Some(speaker) = &self.active_speaker {
            config.set_speaker(speaker.clone());
        }
    }
}

/// Partial update of a councilman row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantPatch {
    pub name: Option<String>,
    pub party: Option<String>,
    pub avatar: Option<Option<String>>,
    pub is_present: Option<bool>,
    pub current_vote: Option<VoteValue>,
    pub is_requesting_floor: Option<bool>,
    pub is_requesting_intervention: Option<bool>,
}

impl ParticipantPatch {
    pub fn apply_to(&self, participant: &mut Participant, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            participant.name = name.clone();
        }
        if let Some(party) = &self.party {
            participant.party = party.clone();
        }
        if let Some(avatar) = &self.avatar {
            participant.avatar = avatar.clone();
        }
        if let Some(present) = self.is_present {
            participant.is_present = present;
        }
        if let Some(vote) = self.current_vote {
            participant.current_vote = vote;
        }
        if let Some(floor) = self.is_requesting_floor {
            participant.set_floor_request(floor, now);
        }
        if let Some(intervention) = self.is_requesting_intervention {
            participant.is_requesting_intervention = intervention;
        }
    }
}

/// Rows touched by a change of speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerChange {
    pub config: ChamberConfig,
    pub participants: Vec<Participant>,
}

/// Rows written by a session close
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub config: ChamberConfig,
    pub bill: Bill,
    pub history: SessionHistory,
    pub participants: Vec<Participant>,
}

/// Chamber config operations
pub trait ChamberRepository {
    /// All chamber configs
    fn list_chambers(&self) -> Result<Vec<ChamberConfig>>;

    /// Find a chamber by city
    fn find_chamber(&self, city: &str) -> Result<Option<ChamberConfig>>;

    /// Create a chamber config
    fn create_chamber(&self, config: &ChamberConfig) -> Result<ChamberConfig>;

    /// Update selected columns of a chamber config
    fn update_chamber(&self, city: &str, patch: &ChamberPatch) -> Result<ChamberConfig>;
}

/// Councilman operations
pub trait ParticipantRepository {
    /// Register a councilman
    fn create_participant(&self, participant: &Participant) -> Result<Participant>;

    /// Find councilman by ID
    fn find_participant(&self, id: &ParticipantId) -> Result<Option<Participant>>;

    /// Councilmen of one city
    fn list_participants(&self, city: &str) -> Result<Vec<Participant>>;

    /// Update selected columns of a councilman
    fn update_participant(&self, id: &ParticipantId, patch: &ParticipantPatch) -> Result<Participant>;
}

/// Bill operations
pub trait BillRepository {
    /// Create a bill
    fn create_bill(&self, bill: &Bill) -> Result<Bill>;

    /// Find bill by ID
    fn find_bill(&self, id: &BillId) -> Result<Option<Bill>>;

    /// All bills
    fn list_bills(&self) -> Result<Vec<Bill>>;

    /// Replace the editable fields of a bill
    fn update_bill(&self, bill: &Bill) -> Result<Bill>;

    /// Set a bill's status
    fn update_bill_status(&self, id: &BillId, status: BillStatus) -> Result<Bill>;
}

/// Session history operations
pub trait HistoryRepository {
    /// Append a history entry
    fn insert_history(&self, entry: &SessionHistory) -> Result<()>;

    /// All history, newest first
    fn list_history(&self) -> Result<Vec<SessionHistory>>;
}

/// Multi-row session operations
pub trait SessionRepository {
    /// Move the floor to a new speaker (or nobody) and fix up speaking flags
    fn set_speaker(
        &self,
        city: &str,
        speaker: Option<(ParticipantId, DateTime<Utc>)>,
    ) -> Result<SpeakerChange>;

    /// Apply a session close as one unit
    fn close_session(&self, closure: &SessionClosure) -> Result<ClosedSession>;
}

/// Change stream access
pub trait ChangeSource {
    /// Subscribe to the streams visible to one chamber
    fn subscribe(&self, city: &str) -> Subscription;

    /// Broadcast the chamber bell
    fn ring_bell(&self, city: &str);
}

/// Combined backend interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or a hosted service.
pub trait Backend:
    ChamberRepository
    + ParticipantRepository
    + BillRepository
    + HistoryRepository
    + SessionRepository
    + ChangeSource
{
}

// Blanket implementation: any type implementing all traits implements Backend
impl<T> Backend for T where
    T: ChamberRepository
        + ParticipantRepository
        + BillRepository
        + HistoryRepository
        + SessionRepository
        + ChangeSource
{
}
