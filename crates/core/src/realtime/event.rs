//! Change events pushed by the backend
//!
//! Rows travel as JSON objects with the backend's column names, mirroring
//! what a hosted change stream delivers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Bill, ChamberConfig, Participant, SessionHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The four entity streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ChamberConfigs,
    Councilmen,
    Bills,
    SessionHistory,
}

impl Table {
    /// Chamber and roster streams are filtered per city; the rest are global
    pub fn is_city_scoped(&self) -> bool {
        matches!(self, Table::ChamberConfigs | Table::Councilmen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::ChamberConfigs => "chamber_configs",
            Table::Councilmen => "councilmen",
            Table::Bills => "bills",
            Table::SessionHistory => "session_history",
        }
    }
}

/// A tagged row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: Table,
    /// City of the row, for city-scoped tables
    #[serde(default)]
    pub city: Option<String>,
    /// New row for INSERT/UPDATE, old key for DELETE
    pub row: Value,
}

/// Decoded form of a change event
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Chamber(ChangeKind, ChamberConfig),
    ChamberDeleted(String),
    Participant(ChangeKind, Participant),
    ParticipantDeleted(String),
    Bill(ChangeKind, Bill),
    BillDeleted(String),
    HistoryInserted(SessionHistory),
}

#[derive(Deserialize)]
struct IdKey {
    id: String,
}

#[derive(Deserialize)]
struct CityKey {
    city: String,
}

impl ChangeEvent {
    fn encode<T: Serialize>(kind: ChangeKind, table: Table, city: Option<&str>, row: &T) -> Result<Self> {
        Ok(Self {
            kind,
            table,
            city: city.map(str::to_string),
            row: serde_json::to_value(row)?,
        })
    }

    pub fn chamber(kind: ChangeKind, config: &ChamberConfig) -> Result<Self> {
        Self::encode(kind, Table::ChamberConfigs, Some(&config.city), config)
    }

    pub fn participant(kind: ChangeKind, participant: &Participant) -> Result<Self> {
        Self::encode(kind, Table::Councilmen, Some(&participant.city), participant)
    }

    pub fn bill(kind: ChangeKind, bill: &Bill) -> Result<Self> {
        Self::encode(kind, Table::Bills, None, bill)
    }

    pub fn history_inserted(entry: &SessionHistory) -> Result<Self> {
        Self::encode(ChangeKind::Insert, Table::SessionHistory, None, entry)
    }

    /// DELETE event carrying only the primary key
    pub fn deleted(table: Table, city: Option<&str>, key: &str) -> Self {
        let row = match table {
            Table::ChamberConfigs => serde_json::json!({ "city": key }),
            _ => serde_json::json!({ "id": key }),
        };
        Self {
            kind: ChangeKind::Delete,
            table,
            city: city.map(str::to_string),
            row,
        }
    }

    fn row_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.row.clone()).map_err(Error::from)
    }

    /// Decode the row for its table
    pub fn decode(&self) -> Result<Change> {
        let change = match (self.table, self.kind) {
            (Table::ChamberConfigs, ChangeKind::Delete) => {
                Change::ChamberDeleted(self.row_as::<CityKey>()?.city)
            }
            (Table::ChamberConfigs, kind) => Change::Chamber(kind, self.row_as()?),
            (Table::Councilmen, ChangeKind::Delete) => {
                Change::ParticipantDeleted(self.row_as::<IdKey>()?.id)
            }
            (Table::Councilmen, kind) => Change::Participant(kind, self.row_as()?),
            (Table::Bills, ChangeKind::Delete) => Change::BillDeleted(self.row_as::<IdKey>()?.id),
            (Table::Bills, kind) => Change::Bill(kind, self.row_as()?),
            (Table::SessionHistory, ChangeKind::Insert) => Change::HistoryInserted(self.row_as()?),
            (Table::SessionHistory, kind) => {
                return Err(Error::InvalidOperation(format!(
                    "session history is append-only, got {:?}",
                    kind
                )))
            }
        };
        Ok(change)
    }
}
