//! Bill storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_bill_kind, parse_bill_status, parse_datetime, OptionalExt};
use crate::error::Result;
use crate::models::{Bill, BillId};

const COLUMNS: &str =
    "id, title, description, author, category, type, status, full_text, updated_at";

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: BillId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        author: row.get(3)?,
        category: row.get(4)?,
        kind: parse_bill_kind(&row.get::<_, String>(5)?)?,
        status: parse_bill_status(&row.get::<_, String>(6)?)?,
        full_text: row.get(7)?,
        updated_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

pub struct BillStore<'a> {
    conn: &'a Connection,
}

impl<'a> BillStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a bill
    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    pub fn create(&self, bill: &Bill) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO bills ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                bill.id.0,
                bill.title,
                bill.description,
                bill.author,
                bill.category,
                bill.kind.as_str(),
                bill.status.as_str(),
                bill.full_text,
                bill.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find bill by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: &BillId) -> Result<Option<Bill>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM bills WHERE id = ?1"))?;
        let bill = stmt.query_row(params![id.0], bill_from_row).optional()?;
        Ok(bill)
    }

    /// List all bills
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Bill>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM bills ORDER BY id"))?;
        let bills = stmt
            .query_map([], bill_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bills)
    }

    /// Write every column of an existing bill; returns rows changed
    #[instrument(skip(self, bill), fields(bill_id = %bill.id, status = %bill.status))]
    pub fn save(&self, bill: &Bill) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE bills SET title = ?1, description = ?2, author = ?3, category = ?4,
                type = ?5, status = ?6, full_text = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                bill.title,
                bill.description,
                bill.author,
                bill.category,
                bill.kind.as_str(),
                bill.status.as_str(),
                bill.full_text,
                bill.updated_at.to_rfc3339(),
                bill.id.0,
            ],
        )?;
        Ok(changed)
    }
}
