//! SQLite storage layer for Plenario
//!
//! `Database` stands in for the hosted backend: it owns the rows, stamps
//! `updated_at` on every write and publishes committed changes on the
//! in-process change feed.

mod bills;
mod chambers;
mod history;
mod migrations;
mod parse;
mod participants;
mod traits;

use std::cell::Cell;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::invariants::{
    assert_chamber_invariants, assert_history_invariants, assert_roster_invariants,
};
use crate::lifecycle::SessionClosure;
use crate::models::{
    Bill, BillId, BillStatus, ChamberConfig, Participant, ParticipantId, SessionHistory,
};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, FeedMessage, Subscription};

pub use bills::BillStore;
pub use chambers::ChamberStore;
pub use history::HistoryStore;
pub use participants::ParticipantStore;
pub use traits::{
    Backend, BillRepository, ChamberPatch, ChamberRepository, ChangeSource, ClosedSession,
    HistoryRepository, ParticipantPatch, ParticipantRepository, SessionRepository, SpeakerChange,
};

/// Main database handle
pub struct Database {
    conn: Connection,
    feed: ChangeFeed,
    /// Last `updated_at` handed out; stamps are strictly increasing
    last_stamp: Cell<DateTime<Utc>>,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            feed: ChangeFeed::new(),
            last_stamp: Cell::new(DateTime::<Utc>::MIN_UTC),
        })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// The feed committed changes are published on
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn chambers(&self) -> ChamberStore<'_> {
        ChamberStore::new(&self.conn)
    }

    pub fn participants(&self) -> ParticipantStore<'_> {
        ParticipantStore::new(&self.conn)
    }

    pub fn bills(&self) -> BillStore<'_> {
        BillStore::new(&self.conn)
    }

    pub fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(&self.conn)
    }

    /// Next write stamp, strictly after every stamp issued before it
    fn stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let floor = self.last_stamp.get() + Duration::microseconds(1);
        let stamp = now.max(floor);
        self.last_stamp.set(stamp);
        stamp
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        for event in events {
            debug!(table = event.table.as_str(), kind = ?event.kind, "Publishing change");
            self.feed.publish(FeedMessage::Change(event));
        }
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl ChamberRepository for Database {
    fn list_chambers(&self) -> Result<Vec<ChamberConfig>> {
        self.chambers().list()
    }

    fn find_chamber(&self, city: &str) -> Result<Option<ChamberConfig>> {
        self.chambers().find(city)
    }

    fn create_chamber(&self, config: &ChamberConfig) -> Result<ChamberConfig> {
        let mut stored = config.clone();
        stored.updated_at = self.stamp();
        self.chambers().create(&stored)?;
        self.publish(vec![ChangeEvent::chamber(ChangeKind::Insert, &stored)?]);
        Ok(stored)
    }

    #[instrument(skip(self, patch))]
    fn update_chamber(&self, city: &str, patch: &ChamberPatch) -> Result<ChamberConfig> {
        let mut config = self
            .chambers()
            .find(city)?
            .ok_or_else(|| Error::NotFound(format!("chamber {}", city)))?;
        patch.apply_to(&mut config);
        config.updated_at = self.stamp();
        assert_chamber_invariants(&config);
        self.chambers().save(&config)?;
        self.publish(vec![ChangeEvent::chamber(ChangeKind::Update, &config)?]);
        Ok(config)
    }
}

impl ParticipantRepository for Database {
    fn create_participant(&self, participant: &Participant) -> Result<Participant> {
        if self.chambers().find(&participant.city)?.is_none() {
            return Err(Error::NotFound(format!("chamber {}", participant.city)));
        }
        let mut stored = participant.clone();
        stored.updated_at = self.stamp();
        self.participants().create(&stored)?;
        self.publish(vec![ChangeEvent::participant(ChangeKind::Insert, &stored)?]);
        Ok(stored)
    }

    fn find_participant(&self, id: &ParticipantId) -> Result<Option<Participant>> {
        self.participants().find_by_id(id)
    }

    fn list_participants(&self, city: &str) -> Result<Vec<Participant>> {
        self.participants().list_for_city(city)
    }

    #[instrument(skip(self, patch))]
    fn update_participant(
        &self,
        id: &ParticipantId,
        patch: &ParticipantPatch,
    ) -> Result<Participant> {
        let mut participant = self
            .participants()
            .find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("councilman {}", id)))?;
        let now = self.stamp();
        patch.apply_to(&mut participant, now);
        participant.updated_at = now;
        self.participants().save(&participant)?;
        self.publish(vec![ChangeEvent::participant(ChangeKind::Update, &participant)?]);
        Ok(participant)
    }
}

impl BillRepository for Database {
    fn create_bill(&self, bill: &Bill) -> Result<Bill> {
        let mut stored = bill.clone();
        stored.updated_at = self.stamp();
        self.bills().create(&stored)?;
        self.publish(vec![ChangeEvent::bill(ChangeKind::Insert, &stored)?]);
        Ok(stored)
    }

    fn find_bill(&self, id: &BillId) -> Result<Option<Bill>> {
        self.bills().find_by_id(id)
    }

    fn list_bills(&self) -> Result<Vec<Bill>> {
        self.bills().list()
    }

    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    fn update_bill(&self, bill: &Bill) -> Result<Bill> {
        let mut stored = bill.clone();
        stored.updated_at = self.stamp();
        if self.bills().save(&stored)? == 0 {
            return Err(Error::NotFound(format!("bill {}", bill.id)));
        }
        self.publish(vec![ChangeEvent::bill(ChangeKind::Update, &stored)?]);
        Ok(stored)
    }

    #[instrument(skip(self))]
    fn update_bill_status(&self, id: &BillId, status: BillStatus) -> Result<Bill> {
        let mut bill = self
            .bills()
            .find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("bill {}", id)))?;
        bill.status = status;
        bill.updated_at = self.stamp();
        self.bills().save(&bill)?;
        self.publish(vec![ChangeEvent::bill(ChangeKind::Update, &bill)?]);
        Ok(bill)
    }
}

impl HistoryRepository for Database {
    fn insert_history(&self, entry: &SessionHistory) -> Result<()> {
        self.history().insert(entry)?;
        self.publish(vec![ChangeEvent::history_inserted(entry)?]);
        Ok(())
    }

    fn list_history(&self) -> Result<Vec<SessionHistory>> {
        self.history().list()
    }
}

impl SessionRepository for Database {
    #[instrument(skip(self, speaker), fields(speaker = ?speaker.as_ref().map(|(id, _)| id.as_str())))]
    fn set_speaker(
        &self,
        city: &str,
        speaker: Option<(ParticipantId, DateTime<Utc>)>,
    ) -> Result<SpeakerChange> {
        let tx = self.conn.unchecked_transaction()?;
        let chambers = ChamberStore::new(&tx);
        let participants = ParticipantStore::new(&tx);

        let mut config = chambers
            .find(city)?
            .ok_or_else(|| Error::NotFound(format!("chamber {}", city)))?;
        let roster = participants.list_for_city(city)?;
        let speaker_id = speaker.as_ref().map(|(id, _)| id.clone());
        if let Some(id) = &speaker_id {
            match roster.iter().find(|p| &p.id == id) {
                None => return Err(Error::NotFound(format!("councilman {} in {}", id, city))),
                Some(p) if !p.is_present => {
                    return Err(Error::InvalidStateTransition(format!("{} is not present", p.name)))
                }
                Some(_) => {}
            }
        }

        let now = self.stamp();
        config.set_speaker(speaker);
        config.updated_at = now;
        chambers.save(&config)?;

        let mut touched = Vec::new();
        let mut after = Vec::with_capacity(roster.len());
        for mut p in roster {
            let speaking = speaker_id.as_ref() == Some(&p.id);
            // The new speaker's floor request has been granted
            let clears_request = speaking && (p.is_requesting_floor || p.is_requesting_intervention);
            if p.is_speaking == speaking && !clears_request {
                after.push(p);
                continue;
            }
            p.is_speaking = speaking;
            if speaking {
                p.set_floor_request(false, now);
                p.is_requesting_intervention = false;
            }
            p.updated_at = now;
            participants.save(&p)?;
            touched.push(p.clone());
            after.push(p);
        }
        assert_chamber_invariants(&config);
        assert_roster_invariants(&config, &after);

        let mut events = vec![ChangeEvent::chamber(ChangeKind::Update, &config)?];
        for p in &touched {
            events.push(ChangeEvent::participant(ChangeKind::Update, p)?);
        }
        tx.commit()?;
        self.publish(events);

        Ok(SpeakerChange {
            config,
            participants: touched,
        })
    }

    #[instrument(skip(self, closure), fields(city = %closure.city, bill_id = %closure.bill_id, outcome = %closure.outcome))]
    fn close_session(&self, closure: &SessionClosure) -> Result<ClosedSession> {
        let tx = self.conn.unchecked_transaction()?;
        let chambers = ChamberStore::new(&tx);
        let participants = ParticipantStore::new(&tx);
        let bills = BillStore::new(&tx);

        let mut config = chambers
            .find(&closure.city)?
            .ok_or_else(|| Error::NotFound(format!("chamber {}", closure.city)))?;
        // Another chair may have closed or replaced the vote since the snapshot
        if config.active_bill_id.as_ref() != Some(&closure.bill_id) || !config.is_voting_open {
            return Err(Error::InvalidStateTransition(format!(
                "voting on {} is no longer open in {}",
                closure.bill_id, closure.city
            )));
        }

        let now = self.stamp();

        assert_history_invariants(&closure.history);
        HistoryStore::new(&tx).insert(&closure.history)?;

        let mut bill = bills
            .find_by_id(&closure.bill_id)?
            .ok_or_else(|| Error::NotFound(format!("bill {}", closure.bill_id)))?;
        bill.status = BillStatus::from(closure.outcome);
        bill.updated_at = now;
        bills.save(&bill)?;

        let mut reset = Vec::with_capacity(closure.reset_participants.len());
        for id in &closure.reset_participants {
            let Some(mut p) = participants.find_by_id(id)? else {
                debug!(participant_id = %id, "Councilman removed before close; skipping reset");
                continue;
            };
            p.reset_for_new_session();
            p.updated_at = now;
            participants.save(&p)?;
            reset.push(p);
        }

        config.clear_session();
        config.last_session_date = Some(closure.closed_at);
        config.updated_at = now;
        chambers.save(&config)?;

        let mut events = vec![
            ChangeEvent::history_inserted(&closure.history)?,
            ChangeEvent::bill(ChangeKind::Update, &bill)?,
        ];
        for p in &reset {
            events.push(ChangeEvent::participant(ChangeKind::Update, p)?);
        }
        events.push(ChangeEvent::chamber(ChangeKind::Update, &config)?);
        tx.commit()?;
        self.publish(events);

        info!(reset = reset.len(), "Session closed");
        Ok(ClosedSession {
            config,
            bill,
            history: closure.history.clone(),
            participants: reset,
        })
    }
}

impl ChangeSource for Database {
    fn subscribe(&self, city: &str) -> Subscription {
        self.feed.subscribe(city)
    }

    fn ring_bell(&self, city: &str) {
        self.feed.publish(FeedMessage::Bell {
            city: city.to_string(),
            at: Utc::now(),
        });
    }
}
