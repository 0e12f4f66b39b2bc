//! User actions on a chamber session

use crate::models::{Bill, BillId, Participant, ParticipantId, VoteValue};
use crate::permissions::SessionAction;

/// Editable profile fields of a councilman
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub party: Option<String>,
    pub avatar: Option<Option<String>>,
}

/// One user action, processed by [`super::SessionController`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Put a bill on the floor for discussion
    StartVoting { bill_id: BillId },
    OpenVoting,
    CompleteVoting,
    CastVote {
        participant_id: ParticipantId,
        vote: VoteValue,
    },
    /// `desired: None` toggles the current request
    RequestFloor {
        participant_id: ParticipantId,
        desired: Option<bool>,
    },
    /// Ask for an aside ("aparte") during someone else's speech
    RequestIntervention {
        participant_id: ParticipantId,
        desired: Option<bool>,
    },
    AuthorizeSpeech { participant_id: ParticipantId },
    DeauthorizeSpeech { participant_id: ParticipantId },
    AddExtraTime,
    RingBell,
    MarkPresent {
        participant_id: ParticipantId,
        present: bool,
    },
    CreateBill(Bill),
    UpdateBill(Bill),
    RegisterParticipant(Participant),
    UpdateParticipant {
        participant_id: ParticipantId,
        profile: ProfileUpdate,
    },
    ConfigureChamber {
        city: String,
        allowed_ip: Option<String>,
        is_active: Option<bool>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartVoting { .. } => "start_voting",
            Command::OpenVoting => "open_voting",
            Command::CompleteVoting => "complete_voting",
            Command::CastVote { .. } => "cast_vote",
            Command::RequestFloor { .. } => "request_floor",
            Command::RequestIntervention { .. } => "request_intervention",
            Command::AuthorizeSpeech { .. } => "authorize_speech",
            Command::DeauthorizeSpeech { .. } => "deauthorize_speech",
            Command::AddExtraTime => "add_extra_time",
            Command::RingBell => "ring_bell",
            Command::MarkPresent { .. } => "mark_present",
            Command::CreateBill(_) => "create_bill",
            Command::UpdateBill(_) => "update_bill",
            Command::RegisterParticipant(_) => "register_participant",
            Command::UpdateParticipant { .. } => "update_participant",
            Command::ConfigureChamber { .. } => "configure_chamber",
        }
    }

    /// The seat a command acts on, if any
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            Command::CastVote { participant_id, .. }
            | Command::RequestFloor { participant_id, .. }
            | Command::RequestIntervention { participant_id, .. }
            | Command::AuthorizeSpeech { participant_id }
            | Command::DeauthorizeSpeech { participant_id }
            | Command::MarkPresent { participant_id, .. }
            | Command::UpdateParticipant { participant_id, .. } => Some(participant_id),
            Command::RegisterParticipant(p) => Some(&p.id),
            _ => None,
        }
    }

    /// Permission needed to run the command
    ///
    /// Floor requests on another member's seat are a chair action.
    pub fn action(&self, acting_on_self: bool) -> SessionAction {
        match self {
            Command::StartVoting { .. } => SessionAction::StartVoting,
            Command::OpenVoting => SessionAction::OpenVoting,
            Command::CompleteVoting => SessionAction::CompleteVoting,
            Command::CastVote { .. } => SessionAction::CastVote,
            Command::RequestFloor { .. } if acting_on_self => SessionAction::RequestFloor,
            Command::RequestIntervention { .. } if acting_on_self => {
                SessionAction::RequestIntervention
            }
            Command::RequestFloor { .. } | Command::RequestIntervention { .. } => {
                SessionAction::ManageFloorRequests
            }
            Command::AuthorizeSpeech { .. } => SessionAction::AuthorizeSpeech,
            Command::DeauthorizeSpeech { .. } => SessionAction::DeauthorizeSpeech,
            Command::AddExtraTime => SessionAction::AddExtraTime,
            Command::RingBell => SessionAction::RingBell,
            Command::MarkPresent { .. } => SessionAction::MarkPresent,
            Command::CreateBill(_) => SessionAction::CreateBill,
            Command::UpdateBill(_) => SessionAction::EditBill,
            Command::RegisterParticipant(_) => SessionAction::RegisterParticipant,
            Command::UpdateParticipant { .. } => SessionAction::EditParticipant,
            Command::ConfigureChamber { .. } => SessionAction::ConfigureChamber,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_request_on_other_seat_is_chair_action() {
        let cmd = Command::RequestFloor {
            participant_id: ParticipantId::new("c1"),
            desired: Some(false),
        };
        assert_eq!(cmd.action(true), SessionAction::RequestFloor);
        assert_eq!(cmd.action(false), SessionAction::ManageFloorRequests);
        assert_eq!(cmd.target(), Some(&ParticipantId::new("c1")));
    }

    #[test]
    fn test_chair_commands_have_no_target() {
        assert_eq!(Command::AddExtraTime.target(), None);
        assert_eq!(Command::OpenVoting.action(false), SessionAction::OpenVoting);
        assert_eq!(Command::CompleteVoting.name(), "complete_voting");
    }
}
