//! Session history - immutable record of a completed vote

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BillId, Participant, ParticipantId, VoteValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "APPROVED",
            Outcome::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated result stored with a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub outcome: Outcome,
}

/// One councilman's vote, frozen at session close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualVote {
    pub participant_id: ParticipantId,
    pub name: String,
    pub party: String,
    pub vote: VoteValue,
}

impl From<&Participant> for IndividualVote {
    fn from(p: &Participant) -> Self {
        Self {
            participant_id: p.id.clone(),
            name: p.name.clone(),
            party: p.party.clone(),
            vote: p.current_vote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub id: Uuid,
    pub bill_id: BillId,
    pub city: String,
    pub date: NaiveDate,
    pub result: VoteResult,
    pub individual_votes: Vec<IndividualVote>,
    pub created_at: DateTime<Utc>,
}

impl SessionHistory {
    pub fn new(
        bill_id: BillId,
        city: String,
        result: VoteResult,
        individual_votes: Vec<IndividualVote>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bill_id,
            city,
            date: now.date_naive(),
            result,
            individual_votes,
            created_at: now,
        }
    }

    /// How a given councilman voted in this session, if they took part
    pub fn vote_of(&self, participant_id: &ParticipantId) -> Option<VoteValue> {
        self.individual_votes
            .iter()
            .find(|v| &v.participant_id == participant_id)
            .map(|v| v.vote)
    }
}
