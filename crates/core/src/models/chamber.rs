//! Chamber configuration - one row per city

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BillId, ParticipantId};

/// Per-city session state and access policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberConfig {
    pub city: String,
    /// Network address the chamber's terminals must connect from
    #[serde(rename = "allowed_ip", default)]
    pub allowed_ip: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_session_date: Option<DateTime<Utc>>,
    /// Bill currently on the floor
    #[serde(default)]
    pub active_bill_id: Option<BillId>,
    /// Participant currently holding the floor
    #[serde(default)]
    pub active_speaker_id: Option<ParticipantId>,
    /// Authorization instant; `None` iff there is no active speaker
    #[serde(default)]
    pub active_speaker_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_voting_open: bool,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl ChamberConfig {
    pub fn new(city: String) -> Self {
        Self {
            city,
            allowed_ip: String::new(),
            is_active: true,
            last_session_date: None,
            active_bill_id: None,
            active_speaker_id: None,
            active_speaker_start_time: None,
            is_voting_open: false,
            updated_at: Utc::now(),
        }
    }

    pub fn with_allowed_ip(mut self, ip: String) -> Self {
        self.allowed_ip = ip;
        self
    }

    pub fn set_speaker(&mut self, speaker: Option<(ParticipantId, DateTime<Utc>)>) {
        match speaker {
            Some((id, start)) => {
                self.active_speaker_id = Some(id);
                self.active_speaker_start_time = Some(start);
            }
            None => {
                self.active_speaker_id = None;
                self.active_speaker_start_time = None;
            }
        }
    }

    /// Clear the floor after a session closes
    pub fn clear_session(&mut self) {
        self.active_bill_id = None;
        self.set_speaker(None);
        self.is_voting_open = false;
    }
}
