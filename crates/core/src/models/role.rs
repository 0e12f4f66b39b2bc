//! Chamber roles and the signed-in user's context

use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Roles resolved by the auth service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Secretary at the session desk
    #[serde(alias = "mesario")]
    Clerk,
    /// Voting member
    Councilman,
    /// Presides over the session and also votes
    President,
    /// Cross-city administrator
    Moderator,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Clerk => "Clerk",
            Role::Councilman => "Councilman",
            Role::President => "President",
            Role::Moderator => "Moderator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "clerk" | "mesario" => Some(Role::Clerk),
            "councilman" => Some(Role::Councilman),
            "president" => Some(Role::President),
            "moderator" => Some(Role::Moderator),
            _ => None,
        }
    }

    /// Can drive the session (start/close votes, grant the floor)
    pub fn has_chair_powers(&self) -> bool {
        matches!(self, Role::Clerk | Role::President | Role::Moderator)
    }

    /// Holds a seat and may vote
    pub fn has_seat(&self) -> bool {
        matches!(self, Role::Councilman | Role::President)
    }

    /// View a user lands on after signing in
    pub fn home_view(&self) -> View {
        match self {
            Role::Councilman | Role::President => View::Session,
            Role::Moderator => View::Moderation,
            Role::Clerk => View::Dashboard,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Top-level views the presentation layer can switch between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Dashboard,
    Bills,
    Session,
    History,
    Plenary,
    Management,
    Moderation,
}

/// Identity supplied by the auth service for the current caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub role: Role,
    pub city: String,
    pub name: String,
    #[serde(default)]
    pub participant_id: Option<ParticipantId>,
}

impl UserContext {
    pub fn new(role: Role, city: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role,
            city: city.into(),
            name: name.into(),
            participant_id: None,
        }
    }

    pub fn with_participant(mut self, id: ParticipantId) -> Self {
        self.participant_id = Some(id);
        self
    }

    /// Whether this caller is acting on their own seat
    pub fn is_self(&self, id: &ParticipantId) -> bool {
        self.participant_id.as_ref() == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesario_alias() {
        let role: Role = serde_json::from_str("\"mesario\"").unwrap();
        assert_eq!(role, Role::Clerk);
        assert_eq!(Role::parse("MESARIO"), Some(Role::Clerk));
    }

    #[test]
    fn test_home_views() {
        assert_eq!(Role::President.home_view(), View::Session);
        assert_eq!(Role::Moderator.home_view(), View::Moderation);
        assert_eq!(Role::Clerk.home_view(), View::Dashboard);
    }
}
