//! Session lifecycle
//!
//! Idle -> Discussion(bill) -> Voting(bill) -> Idle. The phase is derived
//! from the chamber config; transitions are pure and describe the writes
//! the caller must apply.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{
    BillId, BillStatus, ChamberConfig, IndividualVote, Outcome, Participant, ParticipantId,
    SessionHistory,
};
use crate::tally::Tally;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No bill on the floor
    Idle,
    /// Bill on the floor, speeches allowed, ballots closed
    Discussion(BillId),
    /// Ballots open
    Voting(BillId),
}

/// Writes implied by a phase transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseChange {
    pub phase: SessionPhase,
    pub bill_id: BillId,
    pub bill_status: BillStatus,
    pub clear_speaker: bool,
}

impl SessionPhase {
    pub fn from_config(config: &ChamberConfig) -> Self {
        match (&config.active_bill_id, config.is_voting_open) {
            (None, _) => SessionPhase::Idle,
            (Some(bill), false) => SessionPhase::Discussion(bill.clone()),
            (Some(bill), true) => SessionPhase::Voting(bill.clone()),
        }
    }

    pub fn active_bill(&self) -> Option<&BillId> {
        match self {
            SessionPhase::Idle => None,
            SessionPhase::Discussion(b) | SessionPhase::Voting(b) => Some(b),
        }
    }

    pub fn is_voting(&self) -> bool {
        matches!(self, SessionPhase::Voting(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Discussion(_) => "discussion",
            SessionPhase::Voting(_) => "voting",
        }
    }

    /// Put a bill on the floor for discussion
    ///
    /// Re-selecting a bill that is already under discussion restarts its
    /// cycle. Replacing a bill mid-vote is allowed: concurrent chairs are
    /// last-write-wins.
    pub fn start_voting(&self, bill: BillId) -> Result<PhaseChange> {
        Ok(PhaseChange {
            phase: SessionPhase::Discussion(bill.clone()),
            bill_id: bill,
            bill_status: BillStatus::Discussion,
            clear_speaker: true,
        })
    }

    /// Open the ballots for the bill under discussion
    pub fn open_voting(&self) -> Result<PhaseChange> {
        match self {
            SessionPhase::Discussion(bill) => Ok(PhaseChange {
                phase: SessionPhase::Voting(bill.clone()),
                bill_id: bill.clone(),
                bill_status: BillStatus::Voting,
                clear_speaker: false,
            }),
            other => Err(Error::InvalidStateTransition(format!(
                "cannot open voting while {}",
                other.name()
            ))),
        }
    }

    /// Bill whose vote may be closed now
    pub fn ready_to_complete(&self) -> Result<&BillId> {
        match self {
            SessionPhase::Voting(bill) => Ok(bill),
            other => Err(Error::InvalidStateTransition(format!(
                "cannot complete a session while {}",
                other.name()
            ))),
        }
    }

    /// Ballots may only be cast while voting is open
    pub fn accepts_votes(&self) -> Result<()> {
        if self.is_voting() {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition(format!(
                "ballots are closed while {}",
                self.name()
            )))
        }
    }
}

/// Everything a session close writes, applied by the backend as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClosure {
    pub city: String,
    pub bill_id: BillId,
    pub outcome: Outcome,
    pub history: SessionHistory,
    /// Seats to reset to PENDING with no floor request
    pub reset_participants: Vec<ParticipantId>,
    pub closed_at: DateTime<Utc>,
}

impl SessionClosure {
    /// Snapshot the roster and tally for the bill being voted
    pub fn build(
        config: &ChamberConfig,
        roster: &[Participant],
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let phase = SessionPhase::from_config(config);
        let bill_id = phase.ready_to_complete()?.clone();

        let tally = Tally::of(roster);
        let individual_votes: Vec<IndividualVote> = roster.iter().map(IndividualVote::from).collect();
        let history = SessionHistory::new(
            bill_id.clone(),
            config.city.clone(),
            tally.result(),
            individual_votes,
            now,
        );

        Ok(Self {
            city: config.city.clone(),
            bill_id,
            outcome: tally.outcome(),
            history,
            reset_participants: roster.iter().map(|p| p.id.clone()).collect(),
            closed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteValue;

    fn config_in(phase: &SessionPhase) -> ChamberConfig {
        let mut config = ChamberConfig::new("Almenara".into());
        match phase {
            SessionPhase::Idle => {}
            SessionPhase::Discussion(b) => config.active_bill_id = Some(b.clone()),
            SessionPhase::Voting(b) => {
                config.active_bill_id = Some(b.clone());
                config.is_voting_open = true;
            }
        }
        config
    }

    #[test]
    fn test_phase_from_config() {
        let bill = BillId::new("PL-001");
        for phase in [
            SessionPhase::Idle,
            SessionPhase::Discussion(bill.clone()),
            SessionPhase::Voting(bill.clone()),
        ] {
            assert_eq!(SessionPhase::from_config(&config_in(&phase)), phase);
        }
    }

    #[test]
    fn test_happy_path() {
        let bill = BillId::new("PL-001");
        let change = SessionPhase::Idle.start_voting(bill.clone()).unwrap();
        assert_eq!(change.phase, SessionPhase::Discussion(bill.clone()));
        assert_eq!(change.bill_status, BillStatus::Discussion);
        assert!(change.clear_speaker);

        let change = change.phase.open_voting().unwrap();
        assert_eq!(change.phase, SessionPhase::Voting(bill.clone()));
        assert_eq!(change.bill_status, BillStatus::Voting);
        assert!(change.phase.accepts_votes().is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(matches!(
            SessionPhase::Idle.open_voting(),
            Err(Error::InvalidStateTransition(_))
        ));
        let discussion = SessionPhase::Discussion(BillId::new("PL-001"));
        assert!(discussion.ready_to_complete().is_err());
        assert!(discussion.accepts_votes().is_err());
    }

    #[test]
    fn test_closure_snapshot() {
        let bill = BillId::new("PL-002");
        let config = config_in(&SessionPhase::Voting(bill.clone()));
        let votes = [
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::No,
            VoteValue::No,
            VoteValue::Abstain,
        ];
        let roster: Vec<Participant> = votes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut p = Participant::new(
                    ParticipantId::new((i + 1).to_string()),
                    format!("Member {}", i + 1),
                    "PP".into(),
                    "Almenara".into(),
                );
                p.current_vote = *v;
                p
            })
            .collect();

        let closure = SessionClosure::build(&config, &roster, Utc::now()).unwrap();
        assert_eq!(closure.outcome, Outcome::Approved);
        assert_eq!(closure.history.result.yes, 6);
        assert_eq!(closure.history.result.no, 2);
        assert_eq!(closure.history.result.abstain, 1);
        assert_eq!(closure.history.individual_votes.len(), 9);
        assert_eq!(closure.reset_participants.len(), 9);
        assert_eq!(
            closure.history.vote_of(&ParticipantId::new("9")),
            Some(VoteValue::Abstain)
        );
    }

    #[test]
    fn test_closure_requires_voting() {
        let config = config_in(&SessionPhase::Discussion(BillId::new("PL-001")));
        assert!(SessionClosure::build(&config, &[], Utc::now()).is_err());
    }
}
