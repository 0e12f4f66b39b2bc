//! Session command processing
//!
//! Every user action arrives as a [`Command`] for a [`UserContext`]. The
//! controller checks permissions, runs the lifecycle, floor and speech
//! rules against the caller's [`SessionStore`], writes through the
//! backend and folds the stored rows back into the store. Observers learn
//! about the change from the returned notifications and, on other
//! terminals, from the change feed.

mod command;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

pub use command::{Command, ProfileUpdate};

use crate::access::AccessPolicy;
use crate::error::{Error, Result};
use crate::floor::resolve_request;
use crate::lifecycle::SessionClosure;
use crate::models::{Bill, BillId, Participant, ParticipantId, Role, UserContext, View, VoteValue};
use crate::permissions::PermissionMatrix;
use crate::realtime::{ChangeEvent, ChangeKind, Notification};
use crate::speech::SpeechState;
use crate::storage::{Backend, ChamberPatch, ParticipantPatch, SpeakerChange};
use crate::store::SessionStore;

/// Result of signing in to a chamber
#[derive(Debug, Clone, PartialEq)]
pub struct SignIn {
    /// Where the presentation layer should land for this role
    pub home: View,
    pub notifications: Vec<Notification>,
}

/// Tag store and I/O failures with the operation that hit them
fn written<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        Error::Database(_) | Error::Io(_) | Error::Serialization(_) => {
            error!(operation, error = %e, "Backend write failed");
            Error::backend(operation, e)
        }
        other => other,
    })
}

pub struct SessionController<'a, B: Backend> {
    backend: &'a B,
}

impl<'a, B: Backend> SessionController<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Refetch everything, e.g. after the feed reported lost events
    pub fn resync(&self, store: &mut SessionStore, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        store.load_baseline(self.backend, now)
    }

    /// Admit a caller to the chamber and mark their seat present
    #[instrument(skip(self, ctx, store), fields(city = %store.city(), role = %ctx.role))]
    pub fn sign_in(
        &self,
        ctx: &UserContext,
        store: &mut SessionStore,
        client_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignIn> {
        if ctx.role != Role::Moderator && ctx.city != store.city() {
            return Err(Error::AccessDenied(format!(
                "{} is registered in {}, not {}",
                ctx.name,
                ctx.city,
                store.city()
            )));
        }
        AccessPolicy::check(store.config(), ctx.role, client_ip)?;

        let mut notifications = Vec::new();
        if let Some(id) = ctx.participant_id.clone() {
            if ctx.role.has_seat() && store.participant(&id).is_some() {
                notifications = self.execute(
                    ctx,
                    store,
                    Command::MarkPresent {
                        participant_id: id,
                        present: true,
                    },
                    now,
                )?;
            }
        }

        info!(name = %ctx.name, "Signed in");
        Ok(SignIn {
            home: ctx.role.home_view(),
            notifications,
        })
    }

    /// Run one command on behalf of `ctx`
    #[instrument(skip(self, ctx, store, command), fields(city = %store.city(), role = %ctx.role, command = command.name()))]
    pub fn execute(
        &self,
        ctx: &UserContext,
        store: &mut SessionStore,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let city = match &command {
            Command::ConfigureChamber { city, .. } => city.clone(),
            Command::RegisterParticipant(p) => p.city.clone(),
            _ => store.city().to_string(),
        };
        let acting_on_self = command.target().is_some_and(|t| ctx.is_self(t));
        if let Err(e) = PermissionMatrix::authorize(ctx, command.action(acting_on_self), &city, command.target()) {
            warn!(error = %e, "Command refused");
            return Err(e);
        }

        let result = match command {
            Command::StartVoting { bill_id } => self.start_voting(store, bill_id, now),
            Command::OpenVoting => self.open_voting(store, now),
            Command::CompleteVoting => self.complete_voting(store, now),
            Command::CastVote {
                participant_id,
                vote,
            } => self.cast_vote(store, &participant_id, vote, now),
            Command::RequestFloor {
                participant_id,
                desired,
            } => self.request_floor(store, &participant_id, desired, now),
            Command::RequestIntervention {
                participant_id,
                desired,
            } => self.request_intervention(store, &participant_id, desired, now),
            Command::AuthorizeSpeech { participant_id } => {
                self.authorize_speech(store, &participant_id, now)
            }
            Command::DeauthorizeSpeech { participant_id } => store
                .speech()
                .deauthorize(&participant_id)
                .and_then(|next| self.move_floor(store, "deauthorize speech", &next, now)),
            Command::AddExtraTime => store
                .speech()
                .add_extra_time()
                .and_then(|next| self.move_floor(store, "add extra time", &next, now)),
            Command::RingBell => {
                self.backend.ring_bell(store.city());
                info!("Bell rung");
                Ok(Vec::new())
            }
            Command::MarkPresent {
                participant_id,
                present,
            } => self.mark_present(store, &participant_id, present, now),
            Command::CreateBill(bill) => self.create_bill(store, bill, now),
            Command::UpdateBill(bill) => self.update_bill(store, bill, now),
            Command::RegisterParticipant(participant) => {
                self.register_participant(store, participant, now)
            }
            Command::UpdateParticipant {
                participant_id,
                profile,
            } => {
                let patch = ParticipantPatch {
                    name: profile.name,
                    party: profile.party,
                    avatar: profile.avatar,
                    ..Default::default()
                };
                self.edit_participant(store, "update councilman", &participant_id, &patch, now)
                    .map(|(_, notes)| notes)
            }
            Command::ConfigureChamber {
                city,
                allowed_ip,
                is_active,
            } => {
                let patch = ChamberPatch {
                    allowed_ip,
                    is_active,
                    ..Default::default()
                };
                self.configure_chamber(store, &city, &patch, now)
            }
        };

        match &result {
            Ok(notes) => debug!(notifications = notes.len(), "Command applied"),
            Err(e) => warn!(error = %e, "Command rejected"),
        }
        result
    }

    fn start_voting(
        &self,
        store: &mut SessionStore,
        bill_id: BillId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        if self.backend.find_bill(&bill_id)?.is_none() {
            return Err(Error::NotFound(format!("bill {}", bill_id)));
        }
        let change = store.phase().start_voting(bill_id)?;
        let mut notes = Vec::new();

        if change.clear_speaker && store.speech().speaker().is_some() {
            let cleared = written("start voting", self.backend.set_speaker(store.city(), None))?;
            notes.extend(self.adopt_speaker_change(store, cleared, now)?);
        }

        let patch = ChamberPatch {
            active_bill_id: Some(Some(change.bill_id.clone())),
            is_voting_open: Some(false),
            ..Default::default()
        };
        let config = written("start voting", self.backend.update_chamber(store.city(), &patch))?;
        notes.extend(store.adopt_config(config, now)?);

        let bill = written(
            "start voting",
            self.backend.update_bill_status(&change.bill_id, change.bill_status),
        )?;
        notes.extend(store.adopt_bill(bill, now)?);

        info!(bill_id = %change.bill_id, "Bill on the floor");
        Ok(notes)
    }

    fn open_voting(&self, store: &mut SessionStore, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let change = store.phase().open_voting()?;

        let patch = ChamberPatch {
            is_voting_open: Some(true),
            ..Default::default()
        };
        let config = written("open voting", self.backend.update_chamber(store.city(), &patch))?;
        let mut notes = store.adopt_config(config, now)?;

        let bill = written(
            "open voting",
            self.backend.update_bill_status(&change.bill_id, change.bill_status),
        )?;
        notes.extend(store.adopt_bill(bill, now)?);

        info!(bill_id = %change.bill_id, "Voting opened");
        Ok(notes)
    }

    fn complete_voting(&self, store: &mut SessionStore, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        // Snapshot what the backend holds, not local optimistic state
        let config = self
            .backend
            .find_chamber(store.city())?
            .ok_or_else(|| Error::NotFound(format!("chamber {}", store.city())))?;
        let roster = self.backend.list_participants(store.city())?;
        let closure = SessionClosure::build(&config, &roster, now)?;

        let closed = written("complete voting", self.backend.close_session(&closure))?;
        let result = closed.history.result;

        let mut notes = store.adopt_history(closed.history, now)?;
        notes.extend(store.adopt_bill(closed.bill, now)?);
        for participant in closed.participants {
            notes.extend(store.confirm_edit(participant));
        }
        notes.extend(store.adopt_config(closed.config, now)?);

        info!(
            bill_id = %closure.bill_id,
            yes = result.yes,
            no = result.no,
            abstain = result.abstain,
            outcome = %result.outcome,
            "Session completed"
        );
        Ok(notes)
    }

    fn cast_vote(
        &self,
        store: &mut SessionStore,
        id: &ParticipantId,
        vote: VoteValue,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        store.phase().accepts_votes()?;
        if !vote.is_cast() {
            return Err(Error::InvalidOperation("a ballot must be YES, NO or ABSTAIN".into()));
        }
        let patch = ParticipantPatch {
            current_vote: Some(vote),
            ..Default::default()
        };
        let (_, notes) = self.edit_participant(store, "cast vote", id, &patch, now)?;
        Ok(notes)
    }

    fn request_floor(
        &self,
        store: &mut SessionStore,
        id: &ParticipantId,
        desired: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let current = self.seat(store, id)?.is_requesting_floor;
        let requesting = resolve_request(current, desired);
        let patch = ParticipantPatch {
            is_requesting_floor: Some(requesting),
            ..Default::default()
        };
        let (_, mut notes) = self.edit_participant(store, "request floor", id, &patch, now)?;

        // Withdrawing the active speaker's request takes the floor away
        if !requesting && store.speech().is_speaking(id) {
            let cleared = written("request floor", self.backend.set_speaker(store.city(), None))?;
            notes.extend(self.adopt_speaker_change(store, cleared, now)?);
            info!(participant_id = %id, "Active speaker withdrew; floor cleared");
        }
        Ok(notes)
    }

    fn mark_present(
        &self,
        store: &mut SessionStore,
        id: &ParticipantId,
        present: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let mut notes = Vec::new();
        // An absent member cannot hold the floor; clear it before the seat empties
        if !present && store.speech().is_speaking(id) {
            let cleared = written("mark present", self.backend.set_speaker(store.city(), None))?;
            notes.extend(self.adopt_speaker_change(store, cleared, now)?);
            info!(participant_id = %id, "Active speaker left the chamber; floor cleared");
        }
        let patch = ParticipantPatch {
            is_present: Some(present),
            ..Default::default()
        };
        let (_, marked) = self.edit_participant(store, "mark present", id, &patch, now)?;
        notes.extend(marked);
        Ok(notes)
    }

    fn request_intervention(
        &self,
        store: &mut SessionStore,
        id: &ParticipantId,
        desired: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let current = self.seat(store, id)?.is_requesting_intervention;
        let patch = ParticipantPatch {
            is_requesting_intervention: Some(resolve_request(current, desired)),
            ..Default::default()
        };
        let (_, notes) = self.edit_participant(store, "request intervention", id, &patch, now)?;
        Ok(notes)
    }

    fn authorize_speech(
        &self,
        store: &mut SessionStore,
        id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let seat = self.seat(store, id)?;
        if !seat.is_present {
            return Err(Error::InvalidStateTransition(format!(
                "{} is not present",
                seat.name
            )));
        }
        let next = store.speech().authorize(id.clone(), now);
        self.move_floor(store, "authorize speech", &next, now)
    }

    /// Persist a new speech state and adopt the rows it touched
    fn move_floor(
        &self,
        store: &mut SessionStore,
        operation: &'static str,
        next: &SpeechState,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let speaker = next.speaker().cloned().zip(next.started_at());
        let change = written(operation, self.backend.set_speaker(store.city(), speaker))?;
        info!(speaker = ?next.speaker().map(|p| p.as_str()), "Floor moved");
        self.adopt_speaker_change(store, change, now)
    }

    fn adopt_speaker_change(
        &self,
        store: &mut SessionStore,
        change: SpeakerChange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let mut notes = store.adopt_config(change.config, now)?;
        for participant in change.participants {
            notes.extend(store.confirm_edit(participant));
        }
        Ok(notes)
    }

    fn configure_chamber(
        &self,
        store: &mut SessionStore,
        city: &str,
        patch: &ChamberPatch,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let config = written("configure chamber", self.backend.update_chamber(city, patch))?;
        info!(city = %config.city, is_active = config.is_active, "Chamber configured");
        store.adopt_config(config, now)
    }

    fn create_bill(&self, store: &mut SessionStore, bill: Bill, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        if bill.id.as_str().trim().is_empty() || bill.title.trim().is_empty() {
            return Err(Error::InvalidOperation("a bill needs an id and a title".into()));
        }
        if self.backend.find_bill(&bill.id)?.is_some() {
            return Err(Error::InvalidOperation(format!("bill {} already exists", bill.id)));
        }
        let stored = written("create bill", self.backend.create_bill(&bill))?;
        info!(bill_id = %stored.id, "Bill created");
        store.adopt_bill(stored, now)
    }

    fn update_bill(&self, store: &mut SessionStore, mut bill: Bill, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let existing = self
            .backend
            .find_bill(&bill.id)?
            .ok_or_else(|| Error::NotFound(format!("bill {}", bill.id)))?;
        // Status only moves through the session lifecycle
        bill.status = existing.status;
        let stored = written("update bill", self.backend.update_bill(&bill))?;
        store.adopt_bill(stored, now)
    }

    fn register_participant(
        &self,
        store: &mut SessionStore,
        mut participant: Participant,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        if participant.name.trim().is_empty() {
            return Err(Error::InvalidOperation("a councilman needs a name".into()));
        }
        if self.backend.find_participant(&participant.id)?.is_some() {
            return Err(Error::InvalidOperation(format!(
                "councilman {} already registered",
                participant.id
            )));
        }
        participant.reset_for_new_session();
        participant.is_present = false;

        let stored = written("register councilman", self.backend.create_participant(&participant))?;
        info!(participant_id = %stored.id, city = %stored.city, "Councilman registered");
        store.apply(&ChangeEvent::participant(ChangeKind::Insert, &stored)?, now)
    }

    fn seat<'s>(&self, store: &'s SessionStore, id: &ParticipantId) -> Result<&'s Participant> {
        store
            .participant(id)
            .ok_or_else(|| Error::NotFound(format!("councilman {} in {}", id, store.city())))
    }

    /// Optimistic participant write: applied locally first, confirmed with
    /// the stored row or rolled back on failure
    fn edit_participant(
        &self,
        store: &mut SessionStore,
        operation: &'static str,
        id: &ParticipantId,
        patch: &ParticipantPatch,
        now: DateTime<Utc>,
    ) -> Result<(Participant, Vec<Notification>)> {
        let mut notes = store.begin_edit(id, patch, now)?;
        match written(operation, self.backend.update_participant(id, patch)) {
            Ok(row) => {
                notes.extend(store.confirm_edit(row.clone()));
                Ok((row, notes))
            }
            Err(e) => {
                store.rollback_edit(id);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillStatus, ChamberConfig, Outcome};
    use crate::realtime::FeedItem;
    use crate::storage::{
        BillRepository, ChamberRepository, ChangeSource, Database, ParticipantRepository,
    };
    use chrono::Duration;

    const CITY: &str = "Almenara";

    fn setup(seats: usize) -> (Database, SessionStore) {
        let db = Database::open_in_memory().unwrap();
        db.create_chamber(&ChamberConfig::new(CITY.into())).unwrap();
        for i in 1..=seats {
            let mut p = Participant::new(
                ParticipantId::new(format!("c{}", i)),
                format!("Vereador {}", i),
                "PSB".into(),
                CITY.into(),
            );
            p.is_present = true;
            db.create_participant(&p).unwrap();
        }
        db.create_bill(&Bill::new(
            BillId::new("PL-001"),
            "Reforma da praça".into(),
            "Ver. Ana".into(),
        ))
        .unwrap();
        let mut store = SessionStore::new(CITY);
        store.load_baseline(&db, Utc::now()).unwrap();
        (db, store)
    }

    fn clerk() -> UserContext {
        UserContext::new(Role::Clerk, CITY, "Mesa")
    }

    fn seat(id: &str) -> UserContext {
        UserContext::new(Role::Councilman, CITY, id).with_participant(ParticipantId::new(id))
    }

    fn run(db: &Database, ctx: &UserContext, store: &mut SessionStore, cmd: Command) -> Result<Vec<Notification>> {
        SessionController::new(db).execute(ctx, store, cmd, Utc::now())
    }

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    #[test]
    fn test_full_session_nine_seats() {
        let (db, mut store) = setup(9);
        run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        run(&db, &clerk(), &mut store, Command::OpenVoting).unwrap();
        assert_eq!(store.active_bill().unwrap().status, BillStatus::Voting);

        let ballots = [
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::Yes,
            VoteValue::No,
            VoteValue::No,
            VoteValue::Abstain,
        ];
        for (i, vote) in ballots.iter().enumerate() {
            let id = format!("c{}", i + 1);
            run(&db, &seat(&id), &mut store, Command::CastVote { participant_id: pid(&id), vote: *vote }).unwrap();
        }
        let tally = store.tally();
        assert_eq!((tally.yes, tally.no, tally.abstain, tally.pending), (6, 2, 1, 0));

        let notes = run(&db, &clerk(), &mut store, Command::CompleteVoting).unwrap();
        assert!(notes.contains(&Notification::SessionClosed(BillId::new("PL-001"))));
        assert!(notes.contains(&Notification::HistoryAppended));

        let entry = &store.history()[0];
        assert_eq!(entry.result.outcome, Outcome::Approved);
        assert_eq!((entry.result.yes, entry.result.no, entry.result.abstain), (6, 2, 1));
        assert_eq!(entry.individual_votes.len(), 9);
        assert_eq!(store.bill(&BillId::new("PL-001")).unwrap().status, BillStatus::Approved);

        assert!(store
            .participants()
            .iter()
            .all(|p| p.current_vote == VoteValue::Pending && !p.is_requesting_floor));
        let config = store.config().unwrap();
        assert_eq!(config.active_bill_id, None);
        assert_eq!(config.active_speaker_id, None);
        assert!(!config.is_voting_open);
    }

    #[test]
    fn test_tie_is_rejected() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        run(&db, &clerk(), &mut store, Command::OpenVoting).unwrap();
        run(&db, &seat("c1"), &mut store, Command::CastVote { participant_id: pid("c1"), vote: VoteValue::Yes }).unwrap();
        run(&db, &seat("c2"), &mut store, Command::CastVote { participant_id: pid("c2"), vote: VoteValue::No }).unwrap();
        run(&db, &clerk(), &mut store, Command::CompleteVoting).unwrap();
        assert_eq!(store.bill(&BillId::new("PL-001")).unwrap().status, BillStatus::Rejected);
    }

    #[test]
    fn test_votes_only_while_open() {
        let (db, mut store) = setup(1);
        let err = run(&db, &seat("c1"), &mut store, Command::CastVote { participant_id: pid("c1"), vote: VoteValue::Yes }).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
        assert_eq!(store.participant(&pid("c1")).unwrap().current_vote, VoteValue::Pending);

        let err = run(&db, &clerk(), &mut store, Command::CompleteVoting).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
    }

    #[test]
    fn test_permissions_are_enforced() {
        let (db, mut store) = setup(2);
        let err = run(&db, &seat("c1"), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));

        run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        run(&db, &clerk(), &mut store, Command::OpenVoting).unwrap();

        // Someone else's ballot
        let err = run(&db, &seat("c1"), &mut store, Command::CastVote { participant_id: pid("c2"), vote: VoteValue::No }).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        // The clerk has no seat
        let err = run(&db, &clerk(), &mut store, Command::CastVote { participant_id: pid("c2"), vote: VoteValue::No }).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        // Another chamber's clerk
        let outsider = UserContext::new(Role::Clerk, "Pedra Azul", "Mesa PA");
        let err = run(&db, &outsider, &mut store, Command::OpenVoting).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[test]
    fn test_authorize_replaces_previous_speaker() {
        let (db, mut store) = setup(3);
        run(&db, &seat("c1"), &mut store, Command::RequestFloor { participant_id: pid("c1"), desired: None }).unwrap();
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap();
        assert!(store.participant(&pid("c1")).unwrap().is_speaking);
        assert!(!store.participant(&pid("c1")).unwrap().is_requesting_floor);

        let notes = run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c2") }).unwrap();
        assert!(notes.contains(&Notification::SpeakerChanged { from: Some(pid("c1")), to: Some(pid("c2")) }));
        assert_eq!(store.speech().speaker(), Some(&pid("c2")));
        assert!(!store.participant(&pid("c1")).unwrap().is_speaking);
        assert!(store.participant(&pid("c2")).unwrap().is_speaking);
        assert_eq!(store.clock().elapsed_secs(), 0);
    }

    #[test]
    fn test_withdrawing_floor_clears_active_speaker() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap();
        assert!(store.clock().is_running());

        run(&db, &clerk(), &mut store, Command::RequestFloor { participant_id: pid("c1"), desired: Some(false) }).unwrap();
        assert_ne!(store.speech().speaker(), Some(&pid("c1")));
        assert_eq!(store.config().unwrap().active_speaker_id, None);
        assert!(!store.participant(&pid("c1")).unwrap().is_speaking);
        assert_eq!(store.clock().elapsed_secs(), 0);
        assert!(!store.clock().is_running());
    }

    #[test]
    fn test_absent_speaker_loses_floor() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap();

        let notes = run(&db, &seat("c1"), &mut store, Command::MarkPresent { participant_id: pid("c1"), present: false }).unwrap();
        assert!(notes.contains(&Notification::SpeakerChanged { from: Some(pid("c1")), to: None }));

        let chamber = db.find_chamber(CITY).unwrap().unwrap();
        assert_eq!(chamber.active_speaker_id, None);
        assert_eq!(chamber.active_speaker_start_time, None);
        let row = db.find_participant(&pid("c1")).unwrap().unwrap();
        assert!(!row.is_present);
        assert!(!row.is_speaking);

        assert_eq!(store.speech(), SpeechState::NoSpeaker);
        assert!(!store.clock().is_running());
        assert!(!store.participant(&pid("c1")).unwrap().is_present);
    }

    #[test]
    fn test_absent_member_leaves_speaker_alone() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap();
        run(&db, &seat("c2"), &mut store, Command::MarkPresent { participant_id: pid("c2"), present: false }).unwrap();
        assert_eq!(store.speech().speaker(), Some(&pid("c1")));
        assert_eq!(db.find_chamber(CITY).unwrap().unwrap().active_speaker_id, Some(pid("c1")));
    }

    #[test]
    fn test_withdrawing_other_request_keeps_speaker() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap();
        run(&db, &seat("c2"), &mut store, Command::RequestFloor { participant_id: pid("c2"), desired: Some(true) }).unwrap();
        run(&db, &seat("c2"), &mut store, Command::RequestFloor { participant_id: pid("c2"), desired: None }).unwrap();
        assert_eq!(store.speech().speaker(), Some(&pid("c1")));
        assert!(store.floor_queue().is_empty());
    }

    #[test]
    fn test_extra_time_shifts_start() {
        let (db, mut store) = setup(1);
        let ctl = SessionController::new(&db);
        let t0 = Utc::now();
        ctl.execute(&clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }, t0).unwrap();
        assert_eq!(store.tick(t0 + Duration::seconds(100)), 100);

        ctl.execute(&clerk(), &mut store, Command::AddExtraTime, t0 + Duration::seconds(100)).unwrap();
        assert_eq!(
            store.config().unwrap().active_speaker_start_time,
            Some(t0 + Duration::seconds(300))
        );
        assert_eq!(store.clock().elapsed_secs(), 0);
        assert_eq!(store.tick(t0 + Duration::seconds(400)), 100);
        assert_eq!(store.tick(t0 + Duration::seconds(2000)), 600);
    }

    #[test]
    fn test_speech_commands_need_a_speaker() {
        let (db, mut store) = setup(1);
        let err = run(&db, &clerk(), &mut store, Command::AddExtraTime).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
        let err = run(&db, &clerk(), &mut store, Command::DeauthorizeSpeech { participant_id: pid("c1") }).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
    }

    #[test]
    fn test_absent_member_cannot_be_authorized() {
        let (db, mut store) = setup(1);
        run(&db, &seat("c1"), &mut store, Command::MarkPresent { participant_id: pid("c1"), present: false }).unwrap();
        let err = run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c1") }).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
        assert_eq!(store.config().unwrap().active_speaker_id, None);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let (db, mut store) = setup(1);
        // Known locally but missing from the backend
        let mut ghost = Participant::new(pid("ghost"), "Fantasma".into(), "-".into(), CITY.into());
        ghost.updated_at = Utc::now();
        store
            .apply(&ChangeEvent::participant(ChangeKind::Insert, &ghost).unwrap(), Utc::now())
            .unwrap();

        let err = run(&db, &seat("ghost"), &mut store, Command::RequestFloor { participant_id: pid("ghost"), desired: Some(true) }).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let local = store.participant(&pid("ghost")).unwrap();
        assert!(!local.is_requesting_floor);
        assert!(!store.has_pending(&pid("ghost")));
    }

    #[test]
    fn test_start_voting_mid_speech_clears_speaker() {
        let (db, mut store) = setup(2);
        run(&db, &clerk(), &mut store, Command::AuthorizeSpeech { participant_id: pid("c2") }).unwrap();
        let notes = run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        assert!(notes.contains(&Notification::ActiveBillChanged {
            from: None,
            to: Some(BillId::new("PL-001")),
            navigate_to_session: true,
        }));
        assert_eq!(store.speech(), SpeechState::NoSpeaker);
        assert!(!store.participant(&pid("c2")).unwrap().is_speaking);
        assert_eq!(store.active_bill().unwrap().status, BillStatus::Discussion);
    }

    #[test]
    fn test_unknown_bill_cannot_start() {
        let (db, mut store) = setup(1);
        let err = run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-404") }).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_bill_edit_keeps_status() {
        let (db, mut store) = setup(1);
        run(&db, &clerk(), &mut store, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        let mut edited = store.bill(&BillId::new("PL-001")).unwrap().clone();
        edited.title = "Reforma da praça central".into();
        edited.status = BillStatus::Approved;
        run(&db, &clerk(), &mut store, Command::UpdateBill(edited)).unwrap();

        let bill = db.find_bill(&BillId::new("PL-001")).unwrap().unwrap();
        assert_eq!(bill.title, "Reforma da praça central");
        assert_eq!(bill.status, BillStatus::Discussion);

        let dup = Bill::new(BillId::new("PL-001"), "Outro".into(), "X".into());
        assert!(matches!(
            run(&db, &clerk(), &mut store, Command::CreateBill(dup)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_moderator_registers_and_configures() {
        let (db, mut store) = setup(0);
        let moderator = UserContext::new(Role::Moderator, "Itagimirim", "Moderação");
        let newcomer = Participant::new(pid("n1"), "Nova".into(), "PV".into(), CITY.into());
        let notes = run(&db, &moderator, &mut store, Command::RegisterParticipant(newcomer.clone())).unwrap();
        assert_eq!(notes, vec![Notification::RosterChanged]);
        assert!(!store.participant(&pid("n1")).unwrap().is_present);

        let err = run(&db, &clerk(), &mut store, Command::RegisterParticipant(newcomer)).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));

        run(
            &db,
            &moderator,
            &mut store,
            Command::ConfigureChamber {
                city: CITY.into(),
                allowed_ip: Some("200.10.0.1".into()),
                is_active: None,
            },
        )
        .unwrap();
        assert_eq!(store.config().unwrap().allowed_ip, "200.10.0.1");
        assert_eq!(db.find_chamber(CITY).unwrap().unwrap().allowed_ip, "200.10.0.1");
    }

    #[test]
    fn test_sign_in_marks_present_and_checks_network() {
        let (db, mut store) = setup(1);
        let ctl = SessionController::new(&db);
        ctl.execute(&seat("c1"), &mut store, Command::MarkPresent { participant_id: pid("c1"), present: false }, Utc::now())
            .unwrap();

        let signed = ctl.sign_in(&seat("c1"), &mut store, None, Utc::now()).unwrap();
        assert_eq!(signed.home, View::Session);
        assert!(store.participant(&pid("c1")).unwrap().is_present);

        let moderator = UserContext::new(Role::Moderator, CITY, "Moderação");
        ctl.execute(
            &moderator,
            &mut store,
            Command::ConfigureChamber { city: CITY.into(), allowed_ip: Some("200.10.0.1".into()), is_active: None },
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            ctl.sign_in(&clerk(), &mut store, Some("10.0.0.2"), Utc::now()),
            Err(Error::AccessDenied(_))
        ));
        assert_eq!(
            ctl.sign_in(&clerk(), &mut store, Some("200.10.0.1"), Utc::now()).unwrap().home,
            View::Dashboard
        );
        assert_eq!(ctl.sign_in(&moderator, &mut store, None, Utc::now()).unwrap().home, View::Moderation);
    }

    #[test]
    fn test_observers_converge_through_feed() {
        let (db, mut chair) = setup(3);
        let mut display = SessionStore::new(CITY);
        let mut sub = db.subscribe(CITY);
        display.load_baseline(&db, Utc::now()).unwrap();

        run(&db, &clerk(), &mut chair, Command::StartVoting { bill_id: BillId::new("PL-001") }).unwrap();
        run(&db, &clerk(), &mut chair, Command::AuthorizeSpeech { participant_id: pid("c3") }).unwrap();
        run(&db, &seat("c1"), &mut chair, Command::RequestFloor { participant_id: pid("c1"), desired: None }).unwrap();
        run(&db, &clerk(), &mut chair, Command::OpenVoting).unwrap();
        run(&db, &seat("c2"), &mut chair, Command::CastVote { participant_id: pid("c2"), vote: VoteValue::No }).unwrap();
        run(&db, &clerk(), &mut chair, Command::RingBell).unwrap();

        let mut bell = false;
        let mut navigated = false;
        for item in sub.drain() {
            assert!(!matches!(item, FeedItem::Lagged(_)));
            for note in display.apply_item(&item, Utc::now()).unwrap() {
                match note {
                    Notification::BellRang => bell = true,
                    Notification::ActiveBillChanged { navigate_to_session: true, .. } => navigated = true,
                    _ => {}
                }
            }
        }
        assert!(bell);
        assert!(navigated);
        assert_eq!(display.participants(), chair.participants());
        assert_eq!(display.config(), chair.config());
        assert_eq!(display.bills(), chair.bills());
        assert_eq!(display.floor_queue().len(), 1);
        assert_eq!(display.tally().no, 1);
    }
}
