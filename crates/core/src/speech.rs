//! Speech authorization state and the speaking clock
//!
//! The elapsed speaking time is never stored. Every observer derives it
//! from the authorization instant held in the chamber config, so all
//! screens agree regardless of when they joined.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::models::{ChamberConfig, ParticipantId};

/// Hard ceiling for a single speech, in seconds
pub const SPEAKING_CEILING_SECS: i64 = 600;

/// How far "more time" shifts the authorization instant forward
pub const EXTRA_TIME_SECS: i64 = 300;

/// Who holds the floor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechState {
    NoSpeaker,
    Speaking {
        participant: ParticipantId,
        started_at: DateTime<Utc>,
    },
}

impl SpeechState {
    /// Read the speech state out of a chamber config
    pub fn from_config(config: &ChamberConfig) -> Self {
        match (&config.active_speaker_id, config.active_speaker_start_time) {
            (Some(id), Some(started_at)) => SpeechState::Speaking {
                participant: id.clone(),
                started_at,
            },
            // A speaker without a start time is treated as just authorized
            (Some(id), None) => SpeechState::Speaking {
                participant: id.clone(),
                started_at: config.updated_at,
            },
            _ => SpeechState::NoSpeaker,
        }
    }

    pub fn speaker(&self) -> Option<&ParticipantId> {
        match self {
            SpeechState::Speaking { participant, .. } => Some(participant),
            SpeechState::NoSpeaker => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SpeechState::Speaking { started_at, .. } => Some(*started_at),
            SpeechState::NoSpeaker => None,
        }
    }

    pub fn is_speaking(&self, id: &ParticipantId) -> bool {
        self.speaker() == Some(id)
    }

    /// Grant the floor; replaces any current speaker
    pub fn authorize(&self, participant: ParticipantId, now: DateTime<Utc>) -> SpeechState {
        SpeechState::Speaking {
            participant,
            started_at: now,
        }
    }

    /// Take the floor away from `participant`
    pub fn deauthorize(&self, participant: &ParticipantId) -> Result<SpeechState> {
        match self {
            SpeechState::Speaking { participant: current, .. } if current == participant => {
                Ok(SpeechState::NoSpeaker)
            }
            _ => Err(Error::InvalidStateTransition(format!(
                "{} does not hold the floor",
                participant
            ))),
        }
    }

    /// Shift the authorization instant forward by the extra-time increment
    pub fn add_extra_time(&self) -> Result<SpeechState> {
        match self {
            SpeechState::Speaking { participant, started_at } => Ok(SpeechState::Speaking {
                participant: participant.clone(),
                started_at: *started_at + Duration::seconds(EXTRA_TIME_SECS),
            }),
            SpeechState::NoSpeaker => Err(Error::InvalidStateTransition(
                "no speaker holds the floor".into(),
            )),
        }
    }
}

/// Elapsed speaking seconds, clamped to `[0, ceiling]`
pub fn compute_elapsed(now: DateTime<Utc>, started_at: DateTime<Utc>, ceiling: i64) -> i64 {
    (now - started_at).num_seconds().clamp(0, ceiling)
}

/// The elapsed-time display shared by the session and plenary views
///
/// Ticked once per second while a speaker is active and resynced whenever
/// a new start time arrives from the backend.
#[derive(Debug, Clone, Default)]
pub struct SpeakingClock {
    started_at: Option<DateTime<Utc>>,
    elapsed_secs: i64,
}

impl SpeakingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_secs(&self) -> i64 {
        self.elapsed_secs
    }

    pub fn remaining_secs(&self) -> i64 {
        SPEAKING_CEILING_SECS - self.elapsed_secs
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Frozen at the ceiling; the chair must act
    pub fn is_exhausted(&self) -> bool {
        self.elapsed_secs >= SPEAKING_CEILING_SECS
    }

    /// Adopt a fresh start time (or none) and recompute immediately
    pub fn resync(&mut self, started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.started_at = started_at;
        self.tick(now);
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> i64 {
        self.elapsed_secs = match self.started_at {
            Some(start) => compute_elapsed(now, start, SPEAKING_CEILING_SECS),
            None => 0,
        };
        self.elapsed_secs
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.elapsed_secs = 0;
    }

    /// `MM:SS` as shown on the plenary screen
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.elapsed_secs / 60, self.elapsed_secs % 60)
    }
}
