//! Chamber config storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, OptionalExt};
use crate::error::Result;
use crate::models::{BillId, ChamberConfig, ParticipantId};

const COLUMNS: &str = "city, allowed_ip, is_active, last_session_date, active_bill_id, \
    active_speaker_id, active_speaker_start_time, is_voting_open, updated_at";

fn chamber_from_row(row: &Row<'_>) -> rusqlite::Result<ChamberConfig> {
    Ok(ChamberConfig {
        city: row.get(0)?,
        allowed_ip: row.get(1)?,
        is_active: row.get::<_, i32>(2)? != 0,
        last_session_date: parse_datetime_opt(row.get::<_, Option<String>>(3)?)?,
        active_bill_id: row.get::<_, Option<String>>(4)?.map(BillId),
        active_speaker_id: row.get::<_, Option<String>>(5)?.map(ParticipantId),
        active_speaker_start_time: parse_datetime_opt(row.get::<_, Option<String>>(6)?)?,
        is_voting_open: row.get::<_, i32>(7)? != 0,
        updated_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

pub struct ChamberStore<'a> {
    conn: &'a Connection,
}

impl<'a> ChamberStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a chamber config
    #[instrument(skip(self, config), fields(city = %config.city))]
    pub fn create(&self, config: &ChamberConfig) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO chamber_configs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                config.city,
                config.allowed_ip,
                config.is_active as i32,
                config.last_session_date.map(|t| t.to_rfc3339()),
                config.active_bill_id.as_ref().map(|b| b.0.clone()),
                config.active_speaker_id.as_ref().map(|p| p.0.clone()),
                config.active_speaker_start_time.map(|t| t.to_rfc3339()),
                config.is_voting_open as i32,
                config.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find chamber by city
    #[instrument(skip(self))]
    pub fn find(&self, city: &str) -> Result<Option<ChamberConfig>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM chamber_configs WHERE city = ?1"))?;
        let config = stmt.query_row(params![city], chamber_from_row).optional()?;
        Ok(config)
    }

    /// List all chambers
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<ChamberConfig>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM chamber_configs ORDER BY city"))?;
        let configs = stmt
            .query_map([], chamber_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(configs)
    }

    /// Write every column of an existing chamber; returns rows changed
    #[instrument(skip(self, config), fields(city = %config.city))]
    pub fn save(&self, config: &ChamberConfig) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE chamber_configs SET allowed_ip = ?1, is_active = ?2, last_session_date = ?3,
                active_bill_id = ?4, active_speaker_id = ?5, active_speaker_start_time = ?6,
                is_voting_open = ?7, updated_at = ?8
             WHERE city = ?9",
            params![
                config.allowed_ip,
                config.is_active as i32,
                config.last_session_date.map(|t| t.to_rfc3339()),
                config.active_bill_id.as_ref().map(|b| b.0.clone()),
                config.active_speaker_id.as_ref().map(|p| p.0.clone()),
                config.active_speaker_start_time.map(|t| t.to_rfc3339()),
                config.is_voting_open as i32,
                config.updated_at.to_rfc3339(),
                config.city,
            ],
        )?;
        Ok(changed)
    }
}
