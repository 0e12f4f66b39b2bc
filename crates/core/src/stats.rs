//! Dashboard figures derived from bills and session history

use serde::Serialize;

use crate::models::{Bill, BillStatus, Outcome, ParticipantId, SessionHistory, VoteValue};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Bills waiting to be put on the floor
    pub pending_bills: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Share of ballots cast across recorded sessions, rounded
    pub participation_percent: u32,
}

impl DashboardStats {
    /// Figures for one chamber; bills are shared across chambers
    pub fn compute(bills: &[Bill], history: &[SessionHistory], city: &str) -> Self {
        let sessions: Vec<&SessionHistory> = history.iter().filter(|h| h.city == city).collect();
        let seats: usize = sessions.iter().map(|h| h.individual_votes.len()).sum();
        let cast: usize = sessions
            .iter()
            .flat_map(|h| &h.individual_votes)
            .filter(|v| v.vote.is_cast())
            .count();

        Self {
            pending_bills: bills.iter().filter(|b| b.status == BillStatus::Pending).count(),
            approved: sessions
                .iter()
                .filter(|h| h.result.outcome == Outcome::Approved)
                .count(),
            rejected: sessions
                .iter()
                .filter(|h| h.result.outcome == Outcome::Rejected)
                .count(),
            participation_percent: percent(cast, seats),
        }
    }
}

/// One councilman's record over the recorded sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VotingRecord {
    pub total: usize,
    pub yes: usize,
    pub no: usize,
    pub abstain: usize,
    /// YES on an approved bill or NO on a rejected one
    pub aligned: usize,
}

impl VotingRecord {
    pub fn compute(history: &[SessionHistory], participant: &ParticipantId) -> Self {
        let mut record = Self::default();
        for entry in history {
            let Some(vote) = entry.vote_of(participant) else {
                continue;
            };
            record.total += 1;
            match vote {
                VoteValue::Yes => record.yes += 1,
                VoteValue::No => record.no += 1,
                VoteValue::Abstain => record.abstain += 1,
                VoteValue::Pending => {}
            }
            let aligned = matches!(
                (vote, entry.result.outcome),
                (VoteValue::Yes, Outcome::Approved) | (VoteValue::No, Outcome::Rejected)
            );
            if aligned {
                record.aligned += 1;
            }
        }
        record
    }

    pub fn alignment_percent(&self) -> u32 {
        percent(self.aligned, self.total)
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}
