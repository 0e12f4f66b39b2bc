//! Session history storage (append-only)

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_date, parse_datetime, parse_json, parse_uuid};
use crate::error::Result;
use crate::models::{BillId, SessionHistory};

const COLUMNS: &str = "id, bill_id, city, date, result, individual_votes, created_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<SessionHistory> {
    Ok(SessionHistory {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        bill_id: BillId(row.get(1)?),
        city: row.get(2)?,
        date: parse_date(&row.get::<_, String>(3)?)?,
        result: parse_json(&row.get::<_, String>(4)?)?,
        individual_votes: parse_json(&row.get::<_, String>(5)?)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
    })
}

pub struct HistoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a history entry
    #[instrument(skip(self, entry), fields(history_id = %entry.id, bill_id = %entry.bill_id))]
    pub fn insert(&self, entry: &SessionHistory) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO session_history ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                entry.id.to_string(),
                entry.bill_id.0,
                entry.city,
                entry.date.format("%Y-%m-%d").to_string(),
                serde_json::to_string(&entry.result)?,
                serde_json::to_string(&entry.individual_votes)?,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All history, newest first
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<SessionHistory>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM session_history ORDER BY created_at DESC"
        ))?;
        let entries = stmt
            .query_map([], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// History of one bill, newest first
    #[instrument(skip(self))]
    pub fn list_for_bill(&self, bill_id: &BillId) -> Result<Vec<SessionHistory>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM session_history WHERE bill_id = ?1 ORDER BY created_at DESC"
        ))?;
        let entries = stmt
            .query_map(params![bill_id.0], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
