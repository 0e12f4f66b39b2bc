//! Participant (councilman) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a councilman, as issued by the registration service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A councilman's vote on the bill currently on the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteValue {
    Yes,
    No,
    Abstain,
    #[default]
    Pending,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Yes => "YES",
            VoteValue::No => "NO",
            VoteValue::Abstain => "ABSTAIN",
            VoteValue::Pending => "PENDING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "YES" | "SIM" => Some(VoteValue::Yes),
            "NO" | "NAO" | "NÃO" => Some(VoteValue::No),
            "ABSTAIN" | "ABS" => Some(VoteValue::Abstain),
            "PENDING" => Some(VoteValue::Pending),
            _ => None,
        }
    }

    pub fn is_cast(&self) -> bool {
        *self != VoteValue::Pending
    }
}

impl std::fmt::Display for VoteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A voting member of a chamber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub party: String,
    pub city: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_present: bool,
    #[serde(default)]
    pub current_vote: VoteValue,
    #[serde(default)]
    pub is_requesting_floor: bool,
    /// When the current floor request was made; orders the floor queue
    #[serde(default)]
    pub floor_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_requesting_intervention: bool,
    #[serde(default)]
    pub is_speaking: bool,
    /// Stamped by the backend on every write
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: ParticipantId, name: String, party: String, city: String) -> Self {
        Self {
            id,
            name,
            party,
            city,
            avatar: None,
            is_present: false,
            current_vote: VoteValue::Pending,
            is_requesting_floor: false,
            floor_requested_at: None,
            is_requesting_intervention: false,
            is_speaking: false,
            updated_at: Utc::now(),
        }
    }

    /// Set or clear the floor request, keeping the request stamp consistent
    pub fn set_floor_request(&mut self, requesting: bool, at: DateTime<Utc>) {
        if requesting && !self.is_requesting_floor {
            self.floor_requested_at = Some(at);
        } else if !requesting {
            self.floor_requested_at = None;
        }
        self.is_requesting_floor = requesting;
    }

    /// Return to the between-sessions state
    pub fn reset_for_new_session(&mut self) {
        self.current_vote = VoteValue::Pending;
        self.is_requesting_floor = false;
        self.floor_requested_at = None;
        self.is_requesting_intervention = false;
        self.is_speaking = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_wire_names() {
        assert_eq!(serde_json::to_string(&VoteValue::Abstain).unwrap(), "\"ABSTAIN\"");
        let v: VoteValue = serde_json::from_str("\"YES\"").unwrap();
        assert_eq!(v, VoteValue::Yes);
        assert_eq!(VoteValue::parse("sim"), Some(VoteValue::Yes));
        assert_eq!(VoteValue::parse("maybe"), None);
    }

    #[test]
    fn test_floor_request_stamp() {
        let mut p = Participant::new(
            ParticipantId::new("1"),
            "Ana Silva".into(),
            "PT".into(),
            "Almenara".into(),
        );
        let t0 = Utc::now();
        p.set_floor_request(true, t0);
        assert_eq!(p.floor_requested_at, Some(t0));

        // Re-requesting keeps the original position
        p.set_floor_request(true, t0 + chrono::Duration::seconds(5));
        assert_eq!(p.floor_requested_at, Some(t0));

        p.set_floor_request(false, t0);
        assert!(p.floor_requested_at.is_none());
        assert!(!p.is_requesting_floor);
    }
}
