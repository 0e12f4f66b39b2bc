//! Vote tally over a chamber roster

use serde::{Deserialize, Serialize};

use crate::models::{Outcome, Participant, VoteResult, VoteValue};

/// Vote counts for the bill on the floor
///
/// Recomputed from the roster on every change; never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub pending: u32,
}

impl Tally {
    pub fn of<'a, I>(participants: I) -> Self
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        let mut tally = Tally::default();
        for p in participants {
            match p.current_vote {
                VoteValue::Yes => tally.yes += 1,
                VoteValue::No => tally.no += 1,
                VoteValue::Abstain => tally.abstain += 1,
                VoteValue::Pending => tally.pending += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> u32 {
        self.yes + self.no + self.abstain + self.pending
    }

    pub fn votes_cast(&self) -> u32 {
        self.total() - self.pending
    }

    /// Share of the roster that has voted, 0-100
    pub fn progress_percent(&self) -> u32 {
        match self.total() {
            0 => 0,
            total => ((self.votes_cast() as f64 / total as f64) * 100.0).round() as u32,
        }
    }

    /// Strict majority of YES over NO; a tie is a rejection
    pub fn outcome(&self) -> Outcome {
        if self.yes > self.no {
            Outcome::Approved
        } else {
            Outcome::Rejected
        }
    }

    pub fn result(&self) -> VoteResult {
        VoteResult {
            yes: self.yes,
            no: self.no,
            abstain: self.abstain,
            outcome: self.outcome(),
        }
    }
}

/// Members marked present in the chamber
pub fn presence_count<'a, I>(participants: I) -> usize
where
    I: IntoIterator<Item = &'a Participant>,
{
    participants.into_iter().filter(|p| p.is_present).count()
}
