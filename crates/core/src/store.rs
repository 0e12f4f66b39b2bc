//! Local session state and realtime reconciliation
//!
//! `SessionStore` is the explicit state container every observer of one
//! chamber reads from. It is filled by a baseline fetch and then kept
//! current by applying change events in delivery order. Rows carry the
//! backend's `updated_at`; an event older than the local row is dropped
//! and an event with the same stamp is a no-op, so duplicate or reordered
//! deliveries converge on the latest write.
//!
//! Commands mark participant fields they changed optimistically as
//! pending. Incoming rows that do not reflect a pending change keep the
//! local value until the write is confirmed or rolled back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::floor::{floor_queue, FloorEntry};
use crate::lifecycle::SessionPhase;
use crate::models::{Bill, BillId, ChamberConfig, Participant, ParticipantId, SessionHistory};
use crate::realtime::{Change, ChangeEvent, ChangeKind, FeedItem, FeedMessage, Notification};
use crate::speech::{SpeakingClock, SpeechState};
use crate::storage::{Backend, ParticipantPatch};
use crate::tally::{presence_count, Tally};

/// A row keyed by identity and versioned by its backend stamp
trait Versioned {
    fn key(&self) -> &str;
    fn version(&self) -> DateTime<Utc>;
}

impl Versioned for ChamberConfig {
    fn key(&self) -> &str {
        &self.city
    }
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for Participant {
    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for Bill {
    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Inserted,
    Replaced,
    Unchanged,
    Stale,
}

impl Merge {
    fn changed(self) -> bool {
        matches!(self, Merge::Inserted | Merge::Replaced)
    }
}

/// Latest-stamp-wins upsert by key
fn upsert<T: Versioned + PartialEq>(rows: &mut Vec<T>, row: T) -> Merge {
    match rows.iter_mut().find(|r| r.key() == row.key()) {
        None => {
            rows.push(row);
            Merge::Inserted
        }
        Some(existing) if row.version() < existing.version() => Merge::Stale,
        Some(existing) if *existing == row => Merge::Unchanged,
        Some(existing) => {
            *existing = row;
            Merge::Replaced
        }
    }
}

fn remove_by_key<T: Versioned>(rows: &mut Vec<T>, key: &str) -> bool {
    let before = rows.len();
    rows.retain(|r| r.key() != key);
    rows.len() != before
}

/// Drop local rows a baseline no longer contains, unless they are newer
/// than anything in the baseline (inserted after the snapshot was taken)
fn retain_fetched<T: Versioned>(rows: &mut Vec<T>, fetched: &[String], watermark: DateTime<Utc>) {
    rows.retain(|r| fetched.iter().any(|k| k == r.key()) || r.version() > watermark);
}

/// An optimistic participant edit awaiting its write
#[derive(Debug, Clone)]
struct PendingEdit {
    patch: ParticipantPatch,
    /// Row as it was before the first unconfirmed edit
    previous: Participant,
}

impl PendingEdit {
    /// Whether a backend row already carries every pending field
    fn is_reflected_in(&self, row: &Participant) -> bool {
        let p = &self.patch;
        p.name.as_ref().map_or(true, |v| *v == row.name)
            && p.party.as_ref().map_or(true, |v| *v == row.party)
            && p.avatar.as_ref().map_or(true, |v| *v == row.avatar)
            && p.is_present.map_or(true, |v| v == row.is_present)
            && p.current_vote.map_or(true, |v| v == row.current_vote)
            && p.is_requesting_floor.map_or(true, |v| v == row.is_requesting_floor)
            && p
                .is_requesting_intervention
                .map_or(true, |v| v == row.is_requesting_intervention)
    }

    /// Copy the pending fields from `from` onto `row`
    fn carry_fields(&self, from: &Participant, row: &mut Participant) {
        let p = &self.patch;
        if p.name.is_some() {
            row.name = from.name.clone();
        }
        if p.party.is_some() {
            row.party = from.party.clone();
        }
        if p.avatar.is_some() {
            row.avatar = from.avatar.clone();
        }
        if p.is_present.is_some() {
            row.is_present = from.is_present;
        }
        if p.current_vote.is_some() {
            row.current_vote = from.current_vote;
        }
        if p.is_requesting_floor.is_some() {
            row.is_requesting_floor = from.is_requesting_floor;
            row.floor_requested_at = from.floor_requested_at;
        }
        if p.is_requesting_intervention.is_some() {
            row.is_requesting_intervention = from.is_requesting_intervention;
        }
    }
}

/// Merge the field sets of two patches, later values winning
fn merge_patches(earlier: &ParticipantPatch, later: &ParticipantPatch) -> ParticipantPatch {
    ParticipantPatch {
        name: later.name.clone().or_else(|| earlier.name.clone()),
        party: later.party.clone().or_else(|| earlier.party.clone()),
        avatar: later.avatar.clone().or_else(|| earlier.avatar.clone()),
        is_present: later.is_present.or(earlier.is_present),
        current_vote: later.current_vote.or(earlier.current_vote),
        is_requesting_floor: later.is_requesting_floor.or(earlier.is_requesting_floor),
        is_requesting_intervention: later
            .is_requesting_intervention
            .or(earlier.is_requesting_intervention),
    }
}

/// Local view of one chamber's session
#[derive(Debug, Clone)]
pub struct SessionStore {
    city: String,
    configs: Vec<ChamberConfig>,
    participants: Vec<Participant>,
    bills: Vec<Bill>,
    /// Newest first
    history: Vec<SessionHistory>,
    pending: HashMap<ParticipantId, PendingEdit>,
    clock: SpeakingClock,
    bell_rung_at: Option<DateTime<Utc>>,
}

impl SessionStore {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            configs: Vec::new(),
            participants: Vec::new(),
            bills: Vec::new(),
            history: Vec::new(),
            pending: HashMap::new(),
            clock: SpeakingClock::new(),
            bell_rung_at: None,
        }
    }

    /// Fetch every collection and merge it into local state
    ///
    /// Safe to call again after a lagged feed: rows already updated by the
    /// stream are kept when newer than the fetched copy.
    #[instrument(skip(self, backend), fields(city = %self.city))]
    pub fn load_baseline<B: Backend>(
        &mut self,
        backend: &B,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let configs = backend.list_chambers()?;
        let participants = backend.list_participants(&self.city)?;
        let bills = backend.list_bills()?;
        let history = backend.list_history()?;

        let watermark = configs
            .iter()
            .map(|c| c.updated_at)
            .chain(participants.iter().map(|p| p.updated_at))
            .chain(bills.iter().map(|b| b.updated_at))
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let old_config = self.config().cloned();

        let keys: Vec<String> = configs.iter().map(|c| c.city.clone()).collect();
        for config in configs {
            upsert(&mut self.configs, config);
        }
        retain_fetched(&mut self.configs, &keys, watermark);

        let keys: Vec<String> = participants.iter().map(|p| p.id.0.clone()).collect();
        for participant in participants {
            self.merge_participant(participant);
        }
        retain_fetched(&mut self.participants, &keys, watermark);
        let participants = &self.participants;
        self.pending.retain(|id, _| participants.iter().any(|p| &p.id == id));

        let keys: Vec<String> = bills.iter().map(|b| b.id.0.clone()).collect();
        for bill in bills {
            upsert(&mut self.bills, bill);
        }
        retain_fetched(&mut self.bills, &keys, watermark);

        for entry in history {
            self.insert_history(entry);
        }

        debug!(
            participants = self.participants.len(),
            bills = self.bills.len(),
            history = self.history.len(),
            "Baseline loaded"
        );

        let mut notes = vec![
            Notification::ChambersChanged,
            Notification::RosterChanged,
            Notification::BillsChanged,
        ];
        let new_config = self.config().cloned();
        notes.extend(self.config_transitions(old_config.as_ref(), new_config.as_ref(), now));
        Ok(notes)
    }

    /// Apply one item from the change feed
    pub fn apply_item(&mut self, item: &FeedItem, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        match item {
            FeedItem::Message(FeedMessage::Change(event)) => self.apply(event, now),
            FeedItem::Message(FeedMessage::Bell { city, at }) if *city == self.city => {
                self.bell_rung_at = Some(*at);
                Ok(vec![Notification::BellRang])
            }
            FeedItem::Message(FeedMessage::Bell { .. }) => Ok(Vec::new()),
            FeedItem::Lagged(skipped) => {
                warn!(city = %self.city, skipped, "Change events lost; baseline refetch needed");
                Ok(vec![Notification::ResyncRequired])
            }
        }
    }

    /// Apply one change event
    #[instrument(skip(self, event), fields(table = event.table.as_str(), kind = ?event.kind))]
    pub fn apply(&mut self, event: &ChangeEvent, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let notes = match event.decode()? {
            Change::Chamber(_, config) => {
                let own = config.city == self.city;
                let old = if own { self.config().cloned() } else { None };
                if !upsert(&mut self.configs, config).changed() {
                    return Ok(Vec::new());
                }
                let mut notes = vec![Notification::ChambersChanged];
                if own {
                    let new = self.config().cloned();
                    notes.extend(self.config_transitions(old.as_ref(), new.as_ref(), now));
                }
                notes
            }
            Change::ChamberDeleted(city) => {
                let own = city == self.city;
                let old = if own { self.config().cloned() } else { None };
                if !remove_by_key(&mut self.configs, &city) {
                    return Ok(Vec::new());
                }
                let mut notes = vec![Notification::ChambersChanged];
                if own {
                    notes.extend(self.config_transitions(old.as_ref(), None, now));
                }
                notes
            }
            Change::Participant(_, participant) => {
                if participant.city != self.city {
                    debug!(participant_id = %participant.id, "Ignoring councilman of another chamber");
                    return Ok(Vec::new());
                }
                if !self.merge_participant(participant).changed() {
                    return Ok(Vec::new());
                }
                vec![Notification::RosterChanged]
            }
            Change::ParticipantDeleted(id) => {
                self.pending.remove(&ParticipantId(id.clone()));
                if !remove_by_key(&mut self.participants, &id) {
                    return Ok(Vec::new());
                }
                vec![Notification::RosterChanged]
            }
            Change::Bill(_, bill) => {
                if !upsert(&mut self.bills, bill).changed() {
                    return Ok(Vec::new());
                }
                vec![Notification::BillsChanged]
            }
            Change::BillDeleted(id) => {
                if !remove_by_key(&mut self.bills, &id) {
                    return Ok(Vec::new());
                }
                vec![Notification::BillsChanged]
            }
            Change::HistoryInserted(entry) => {
                if !self.insert_history(entry) {
                    return Ok(Vec::new());
                }
                vec![Notification::HistoryAppended]
            }
        };
        Ok(notes)
    }

    /// Upsert a participant row, keeping unconfirmed local edits
    fn merge_participant(&mut self, mut row: Participant) -> Merge {
        if let Some(edit) = self.pending.get(&row.id) {
            if edit.is_reflected_in(&row) {
                debug!(participant_id = %row.id, "Pending edit confirmed by backend row");
                self.pending.remove(&row.id);
            } else if let Some(local) = self.participants.iter().find(|p| p.id == row.id) {
                edit.carry_fields(local, &mut row);
            }
        }
        upsert(&mut self.participants, row)
    }

    /// Insert keeping newest-first order; false if already present
    fn insert_history(&mut self, entry: SessionHistory) -> bool {
        if self.history.iter().any(|h| h.id == entry.id) {
            return false;
        }
        let at = self
            .history
            .iter()
            .position(|h| h.created_at < entry.created_at)
            .unwrap_or(self.history.len());
        self.history.insert(at, entry);
        true
    }

    /// Notifications for a change of the own chamber's config
    fn config_transitions(
        &mut self,
        old: Option<&ChamberConfig>,
        new: Option<&ChamberConfig>,
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        let mut notes = Vec::new();
        let old_phase = old.map(SessionPhase::from_config).unwrap_or(SessionPhase::Idle);
        let new_phase = new.map(SessionPhase::from_config).unwrap_or(SessionPhase::Idle);

        let from = old_phase.active_bill().cloned();
        let to = new_phase.active_bill().cloned();
        if from != to {
            notes.push(Notification::ActiveBillChanged {
                navigate_to_session: to.is_some(),
                from: from.clone(),
                to: to.clone(),
            });
        }
        match (&old_phase, &new_phase) {
            (SessionPhase::Voting(_), SessionPhase::Voting(_)) => {}
            (_, SessionPhase::Voting(bill)) => notes.push(Notification::VotingOpened(bill.clone())),
            (SessionPhase::Voting(bill), SessionPhase::Idle) => {
                notes.push(Notification::SessionClosed(bill.clone()))
            }
            _ => {}
        }

        let old_speech = old.map(SpeechState::from_config).unwrap_or(SpeechState::NoSpeaker);
        let new_speech = new.map(SpeechState::from_config).unwrap_or(SpeechState::NoSpeaker);
        if old_speech.speaker() != new_speech.speaker() {
            notes.push(Notification::SpeakerChanged {
                from: old_speech.speaker().cloned(),
                to: new_speech.speaker().cloned(),
            });
        }
        if old_speech != new_speech || self.clock.is_running() != new_speech.started_at().is_some() {
            match new_speech.started_at() {
                Some(start) => {
                    self.clock.resync(Some(start), now);
                    notes.push(Notification::SpeakerClockResync {
                        elapsed_secs: self.clock.elapsed_secs(),
                    });
                }
                None => self.clock.reset(),
            }
        }
        notes
    }

    /// Apply an optimistic participant edit ahead of its write
    pub fn begin_edit(
        &mut self,
        id: &ParticipantId,
        patch: &ParticipantPatch,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| Error::NotFound(format!("councilman {}", id)))?;

        let edit = match self.pending.remove(id) {
            Some(existing) => PendingEdit {
                patch: merge_patches(&existing.patch, patch),
                previous: existing.previous,
            },
            None => PendingEdit {
                patch: patch.clone(),
                previous: participant.clone(),
            },
        };
        patch.apply_to(participant, now);
        self.pending.insert(id.clone(), edit);
        Ok(vec![Notification::RosterChanged])
    }

    /// The write succeeded; adopt the stored row
    pub fn confirm_edit(&mut self, row: Participant) -> Vec<Notification> {
        self.pending.remove(&row.id);
        if upsert(&mut self.participants, row).changed() {
            vec![Notification::RosterChanged]
        } else {
            Vec::new()
        }
    }

    /// The write failed; restore the fields the edit touched
    pub fn rollback_edit(&mut self, id: &ParticipantId) -> Vec<Notification> {
        let Some(edit) = self.pending.remove(id) else {
            return Vec::new();
        };
        if let Some(row) = self.participants.iter_mut().find(|p| &p.id == id) {
            edit.carry_fields(&edit.previous, row);
        }
        vec![Notification::RosterChanged]
    }

    pub fn has_pending(&self, id: &ParticipantId) -> bool {
        self.pending.contains_key(id)
    }

    /// Adopt rows returned by a successful write without waiting for the stream
    pub fn adopt_config(&mut self, config: ChamberConfig, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        self.apply(&ChangeEvent::chamber(ChangeKind::Update, &config)?, now)
    }

    pub fn adopt_bill(&mut self, bill: Bill, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        self.apply(&ChangeEvent::bill(ChangeKind::Update, &bill)?, now)
    }

    pub fn adopt_history(&mut self, entry: SessionHistory, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        self.apply(&ChangeEvent::history_inserted(&entry)?, now)
    }

    /// Advance the speaking clock; returns elapsed seconds
    pub fn tick(&mut self, now: DateTime<Utc>) -> i64 {
        self.clock.tick(now)
    }

    // Queries

    pub fn city(&self) -> &str {
        &self.city
    }

    /// This chamber's config, once loaded
    pub fn config(&self) -> Option<&ChamberConfig> {
        self.configs.iter().find(|c| c.city == self.city)
    }

    pub fn configs(&self) -> &[ChamberConfig] {
        &self.configs
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    /// Bills whose title, id or author contains `term`; all of them when blank
    pub fn search_bills(&self, term: &str) -> Vec<&Bill> {
        self.bills.iter().filter(|b| b.matches(term)).collect()
    }

    pub fn bill(&self, id: &BillId) -> Option<&Bill> {
        self.bills.iter().find(|b| &b.id == id)
    }

    pub fn active_bill(&self) -> Option<&Bill> {
        self.phase().active_bill().and_then(|id| self.bill(id))
    }

    pub fn history(&self) -> &[SessionHistory] {
        &self.history
    }

    pub fn phase(&self) -> SessionPhase {
        self.config()
            .map(SessionPhase::from_config)
            .unwrap_or(SessionPhase::Idle)
    }

    pub fn speech(&self) -> SpeechState {
        self.config()
            .map(SpeechState::from_config)
            .unwrap_or(SpeechState::NoSpeaker)
    }

    pub fn tally(&self) -> Tally {
        Tally::of(&self.participants)
    }

    pub fn present_count(&self) -> usize {
        presence_count(&self.participants)
    }

    pub fn floor_queue(&self) -> Vec<FloorEntry<'_>> {
        floor_queue(&self.participants)
    }

    pub fn clock(&self) -> &SpeakingClock {
        &self.clock
    }

    pub fn bell_rung_at(&self) -> Option<DateTime<Utc>> {
        self.bell_rung_at
    }
}
