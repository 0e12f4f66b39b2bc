//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{ChamberConfig, Participant, SessionHistory, VoteValue};

/// Validate that a chamber config is internally consistent
pub fn assert_chamber_invariants(config: &ChamberConfig) {
    // Speaker and start time move together
    debug_assert!(
        config.active_speaker_id.is_some() == config.active_speaker_start_time.is_some(),
        "Chamber {} has speaker {:?} with start time {:?}",
        config.city,
        config.active_speaker_id,
        config.active_speaker_start_time
    );

    // Ballots can only be open for a bill on the floor
    debug_assert!(
        !config.is_voting_open || config.active_bill_id.is_some(),
        "Chamber {} has voting open with no active bill",
        config.city
    );
}

/// Validate a chamber's roster against its config
pub fn assert_roster_invariants(config: &ChamberConfig, roster: &[Participant]) {
    let speaking: Vec<&Participant> = roster.iter().filter(|p| p.is_speaking).collect();
    debug_assert!(
        speaking.len() <= 1,
        "Chamber {} has {} participants speaking",
        config.city,
        speaking.len()
    );

    if let Some(p) = speaking.first() {
        debug_assert!(
            config.active_speaker_id.as_ref() == Some(&p.id),
            "Chamber {} shows {} speaking but active speaker is {:?}",
            config.city,
            p.id,
            config.active_speaker_id
        );
    }

    if let Some(id) = &config.active_speaker_id {
        debug_assert!(
            roster.iter().any(|p| &p.id == id && p.is_present),
            "Chamber {} active speaker {} is absent",
            config.city,
            id
        );
    }

    for p in roster {
        debug_assert!(
            p.is_requesting_floor || p.floor_requested_at.is_none(),
            "Councilman {} has a floor request stamp without a request",
            p.id
        );
        debug_assert!(
            p.city == config.city,
            "Councilman {} of {} listed in chamber {}",
            p.id,
            p.city,
            config.city
        );
    }
}

/// Validate that a history entry's tally matches its snapshot
pub fn assert_history_invariants(entry: &SessionHistory) {
    let counted = |v: VoteValue| {
        entry
            .individual_votes
            .iter()
            .filter(|iv| iv.vote == v)
            .count() as u32
    };
    debug_assert!(
        entry.result.yes == counted(VoteValue::Yes)
            && entry.result.no == counted(VoteValue::No)
            && entry.result.abstain == counted(VoteValue::Abstain),
        "History {} result {:?} disagrees with its individual votes",
        entry.id,
        entry.result
    );
}
