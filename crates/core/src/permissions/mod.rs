//! Permission system for chamber operations
//!
//! Controls hidden by the UI are not a security boundary; every command
//! goes through this matrix before touching state.

use crate::error::{Error, Result};
use crate::models::{ParticipantId, Role, UserContext};

/// Actions that can be performed in a chamber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    // Lifecycle
    StartVoting,
    OpenVoting,
    CompleteVoting,

    // Floor control
    AuthorizeSpeech,
    DeauthorizeSpeech,
    AddExtraTime,
    ManageFloorRequests,
    RingBell,

    // Seat actions (own seat only)
    CastVote,
    RequestFloor,
    RequestIntervention,
    MarkPresent,

    // Agenda
    CreateBill,
    EditBill,

    // Administration
    RegisterParticipant,
    EditParticipant,
    ConfigureChamber,

    ViewSession,
}

impl SessionAction {
    /// Seat actions may only target the caller's own participant record
    pub fn is_self_service(&self) -> bool {
        matches!(
            self,
            SessionAction::CastVote
                | SessionAction::RequestFloor
                | SessionAction::RequestIntervention
                | SessionAction::MarkPresent
        )
    }
}

/// Permission matrix for chamber roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Role, action: SessionAction) -> bool {
        match action {
            // Chair powers - clerk, president and moderator
            SessionAction::StartVoting
            | SessionAction::OpenVoting
            | SessionAction::CompleteVoting
            | SessionAction::AuthorizeSpeech
            | SessionAction::DeauthorizeSpeech
            | SessionAction::AddExtraTime
            | SessionAction::ManageFloorRequests
            | SessionAction::RingBell
            | SessionAction::CreateBill
            | SessionAction::EditBill => role.has_chair_powers(),

            // Seat holders act for themselves
            SessionAction::CastVote
            | SessionAction::RequestFloor
            | SessionAction::RequestIntervention
            | SessionAction::MarkPresent => role.has_seat(),

            // Moderator owns the roster and chamber settings
            SessionAction::RegisterParticipant | SessionAction::ConfigureChamber => {
                role == Role::Moderator
            }
            SessionAction::EditParticipant => role.has_chair_powers(),

            SessionAction::ViewSession => true,
        }
    }

    /// Full gate: role, chamber scope and seat ownership
    ///
    /// Moderators administer every city; everyone else is confined to the
    /// chamber they signed in to.
    pub fn authorize(
        ctx: &UserContext,
        action: SessionAction,
        city: &str,
        target: Option<&ParticipantId>,
    ) -> Result<()> {
        if !Self::can_perform(ctx.role, action) {
            return Err(Error::PermissionDenied(format!(
                "{} may not perform {:?}",
                ctx.role, action
            )));
        }

        if ctx.role != Role::Moderator && ctx.city != city {
            return Err(Error::PermissionDenied(format!(
                "{} belongs to chamber {}, not {}",
                ctx.name, ctx.city, city
            )));
        }

        if action.is_self_service() {
            match target {
                Some(id) if ctx.is_self(id) => {}
                _ => {
                    return Err(Error::PermissionDenied(format!(
                        "{:?} is only allowed on the caller's own seat",
                        action
                    )))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> UserContext {
        UserContext::new(role, "Almenara", "Test").with_participant(ParticipantId::new("1"))
    }

    #[test]
    fn test_chair_permissions() {
        for role in [Role::Clerk, Role::President, Role::Moderator] {
            assert!(PermissionMatrix::can_perform(role, SessionAction::CompleteVoting));
            assert!(PermissionMatrix::can_perform(role, SessionAction::AuthorizeSpeech));
        }
        assert!(!PermissionMatrix::can_perform(Role::Councilman, SessionAction::AuthorizeSpeech));
        assert!(!PermissionMatrix::can_perform(Role::Councilman, SessionAction::CompleteVoting));
    }

    #[test]
    fn test_seat_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Councilman, SessionAction::CastVote));
        assert!(PermissionMatrix::can_perform(Role::President, SessionAction::CastVote));
        assert!(!PermissionMatrix::can_perform(Role::Clerk, SessionAction::CastVote));
        assert!(!PermissionMatrix::can_perform(Role::Moderator, SessionAction::RequestFloor));
    }

    #[test]
    fn test_admin_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Moderator, SessionAction::ConfigureChamber));
        assert!(!PermissionMatrix::can_perform(Role::President, SessionAction::ConfigureChamber));
        assert!(!PermissionMatrix::can_perform(Role::Clerk, SessionAction::RegisterParticipant));
    }

    #[test]
    fn test_vote_only_on_own_seat() {
        let me = ctx(Role::Councilman);
        assert!(PermissionMatrix::authorize(
            &me,
            SessionAction::CastVote,
            "Almenara",
            Some(&ParticipantId::new("1"))
        )
        .is_ok());

        let err = PermissionMatrix::authorize(
            &me,
            SessionAction::CastVote,
            "Almenara",
            Some(&ParticipantId::new("2")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[test]
    fn test_city_scope() {
        let clerk = ctx(Role::Clerk);
        assert!(PermissionMatrix::authorize(&clerk, SessionAction::StartVoting, "Pedra Azul", None).is_err());

        let moderator = ctx(Role::Moderator);
        assert!(
            PermissionMatrix::authorize(&moderator, SessionAction::ConfigureChamber, "Pedra Azul", None)
                .is_ok()
        );
    }
}
