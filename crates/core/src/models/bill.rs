//! Bill (projeto de lei) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Outcome;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillId(pub String);

impl BillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of proposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillKind {
    /// Projeto de lei
    #[default]
    Pl,
    Indication,
}

impl BillKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillKind::Pl => "PL",
            BillKind::Indication => "INDICATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PL" => Some(BillKind::Pl),
            "INDICATION" => Some(BillKind::Indication),
            _ => None,
        }
    }
}

/// Bill status; advances PENDING -> DISCUSSION -> VOTING -> outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    #[default]
    Pending,
    Discussion,
    Voting,
    Approved,
    Rejected,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "PENDING",
            BillStatus::Discussion => "DISCUSSION",
            BillStatus::Voting => "VOTING",
            BillStatus::Approved => "APPROVED",
            BillStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(BillStatus::Pending),
            "DISCUSSION" => Some(BillStatus::Discussion),
            "VOTING" => Some(BillStatus::Voting),
            "APPROVED" => Some(BillStatus::Approved),
            "REJECTED" => Some(BillStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, BillStatus::Approved | BillStatus::Rejected)
    }
}

impl From<Outcome> for BillStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Approved => BillStatus::Approved,
            Outcome::Rejected => BillStatus::Rejected,
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: BillKind,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default)]
    pub full_text: String,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn new(id: BillId, title: String, author: String) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            author,
            category: String::new(),
            kind: BillKind::Pl,
            status: BillStatus::Pending,
            full_text: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Case-insensitive substring match on title, id or author
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || [self.title.as_str(), self.id.as_str(), self.author.as_str()]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
    }
}
