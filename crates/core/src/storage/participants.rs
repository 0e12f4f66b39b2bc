//! Councilman storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, parse_vote, OptionalExt};
use crate::error::Result;
use crate::models::{Participant, ParticipantId};

const COLUMNS: &str = "id, name, party, city, avatar, is_present, current_vote, \
    is_requesting_floor, floor_requested_at, is_requesting_intervention, is_speaking, updated_at";

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: ParticipantId(row.get(0)?),
        name: row.get(1)?,
        party: row.get(2)?,
        city: row.get(3)?,
        avatar: row.get(4)?,
        is_present: row.get::<_, i32>(5)? != 0,
        current_vote: parse_vote(&row.get::<_, String>(6)?)?,
        is_requesting_floor: row.get::<_, i32>(7)? != 0,
        floor_requested_at: parse_datetime_opt(row.get::<_, Option<String>>(8)?)?,
        is_requesting_intervention: row.get::<_, i32>(9)? != 0,
        is_speaking: row.get::<_, i32>(10)? != 0,
        updated_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

pub struct ParticipantStore<'a> {
    conn: &'a Connection,
}

impl<'a> ParticipantStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Register a councilman
    #[instrument(skip(self, p), fields(participant_id = %p.id, city = %p.city))]
    pub fn create(&self, p: &Participant) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO councilmen ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                p.id.0,
                p.name,
                p.party,
                p.city,
                p.avatar,
                p.is_present as i32,
                p.current_vote.as_str(),
                p.is_requesting_floor as i32,
                p.floor_requested_at.map(|t| t.to_rfc3339()),
                p.is_requesting_intervention as i32,
                p.is_speaking as i32,
                p.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find councilman by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: &ParticipantId) -> Result<Option<Participant>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM councilmen WHERE id = ?1"))?;
        let participant = stmt.query_row(params![id.0], participant_from_row).optional()?;
        Ok(participant)
    }

    /// List councilmen of a city, in roster order
    #[instrument(skip(self))]
    pub fn list_for_city(&self, city: &str) -> Result<Vec<Participant>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM councilmen WHERE city = ?1 ORDER BY name, id"
        ))?;
        let participants = stmt
            .query_map(params![city], participant_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    /// Write every mutable column; returns rows changed
    #[instrument(skip(self, p), fields(participant_id = %p.id))]
    pub fn save(&self, p: &Participant) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE councilmen SET name = ?1, party = ?2, avatar = ?3, is_present = ?4,
                current_vote = ?5, is_requesting_floor = ?6, floor_requested_at = ?7,
                is_requesting_intervention = ?8, is_speaking = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                p.name,
                p.party,
                p.avatar,
                p.is_present as i32,
                p.current_vote.as_str(),
                p.is_requesting_floor as i32,
                p.floor_requested_at.map(|t| t.to_rfc3339()),
                p.is_requesting_intervention as i32,
                p.is_speaking as i32,
                p.updated_at.to_rfc3339(),
                p.id.0,
            ],
        )?;
        Ok(changed)
    }
}
