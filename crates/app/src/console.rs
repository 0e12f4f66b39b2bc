//! Line-oriented chamber console
//!
//! Parses operator input into session commands and renders the session
//! state and notifications as plain text.

use std::fmt::Write as _;

use plenario_core::{
    Bill, BillId, BillKind, Command, DashboardStats, Notification, Participant, ParticipantId,
    ProfileUpdate, SessionPhase, SessionStore, UserContext, VoteValue, VotingRecord,
    SPEAKING_CEILING_SECS,
};

pub const HELP: &str = "\
Session:  start <bill> | open | close | vote <yes|no|abstain> [id]
Floor:    floor [on|off] [id] | aparte [on|off] [id] | speak <id> | stop <id> | extra | bell
Seats:    present [on|off] [id] | register <id> <party> <name...> | rename <id> <name...>
Agenda:   bill <id> <title...> | amend <id> <title|description|author|category|type|text> <value...>
Chamber:  allow <ip|-> [city] | activate <on|off> [city]
Views:    status | queue | tally | bills [search...] | history | stats | record [id] | help | quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Run(Command),
    Status,
    Queue,
    Tally,
    /// Bill list, filtered by an optional search term
    Bills(Option<String>),
    /// Change one field of a bill; resolved against the store by [`amend`]
    Amend {
        bill_id: BillId,
        field: BillField,
        value: String,
    },
    History,
    Stats,
    Record(ParticipantId),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command '{0}'; type 'help'")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("This terminal has no seat; name the councilman id")]
    NoSeat,
    #[error("Unknown bill {0}")]
    UnknownBill(BillId),
}

/// Bill fields editable from the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillField {
    Title,
    Description,
    Author,
    Category,
    Kind,
    FullText,
}

impl BillField {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "title" => Some(BillField::Title),
            "description" => Some(BillField::Description),
            "author" => Some(BillField::Author),
            "category" => Some(BillField::Category),
            "type" => Some(BillField::Kind),
            "text" => Some(BillField::FullText),
            _ => None,
        }
    }
}

const AMEND_USAGE: &str = "amend <id> <title|description|author|category|type|text> <value...>";

fn switch(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "yes" | "sim" => Some(true),
        "off" | "no" | "nao" => Some(false),
        _ => None,
    }
}

/// Seat named on the line, or the terminal's own seat
fn seat(ctx: &UserContext, word: Option<&&str>) -> Result<ParticipantId, ParseError> {
    match word {
        Some(id) => Ok(ParticipantId::new(*id)),
        None => ctx.participant_id.clone().ok_or(ParseError::NoSeat),
    }
}

/// `[on|off] [id]` as used by the seat toggles
fn toggle_args(ctx: &UserContext, args: &[&str]) -> Result<(Option<bool>, ParticipantId), ParseError> {
    match args.split_first() {
        Some((first, rest)) => match switch(first) {
            Some(flag) => Ok((Some(flag), seat(ctx, rest.first())?)),
            None => Ok((None, seat(ctx, Some(first))?)),
        },
        None => Ok((None, seat(ctx, None)?)),
    }
}

/// Rest of the line as a city name, defaulting to the terminal's chamber
fn city_arg(ctx: &UserContext, words: &[&str]) -> String {
    if words.is_empty() {
        ctx.city.clone()
    } else {
        words.join(" ")
    }
}

/// Parse one line; blank lines yield `None`
pub fn parse(line: &str, ctx: &UserContext) -> Result<Option<Input>, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = words.split_first() else {
        return Ok(None);
    };

    let input = match head.to_ascii_lowercase().as_str() {
        "start" => match args {
            [bill] => Input::Run(Command::StartVoting {
                bill_id: BillId::new(*bill),
            }),
            _ => return Err(ParseError::Usage("start <bill>")),
        },
        "open" => Input::Run(Command::OpenVoting),
        "close" => Input::Run(Command::CompleteVoting),
        "vote" => {
            let vote = args
                .first()
                .and_then(|w| VoteValue::parse(w))
                .filter(|v| v.is_cast())
                .ok_or(ParseError::Usage("vote <yes|no|abstain> [id]"))?;
            Input::Run(Command::CastVote {
                participant_id: seat(ctx, args.get(1))?,
                vote,
            })
        }
        "floor" => {
            let (desired, participant_id) = toggle_args(ctx, args)?;
            Input::Run(Command::RequestFloor {
                participant_id,
                desired,
            })
        }
        "aparte" => {
            let (desired, participant_id) = toggle_args(ctx, args)?;
            Input::Run(Command::RequestIntervention {
                participant_id,
                desired,
            })
        }
        "speak" => match args {
            [id] => Input::Run(Command::AuthorizeSpeech {
                participant_id: ParticipantId::new(*id),
            }),
            _ => return Err(ParseError::Usage("speak <id>")),
        },
        "stop" => match args {
            [id] => Input::Run(Command::DeauthorizeSpeech {
                participant_id: ParticipantId::new(*id),
            }),
            _ => return Err(ParseError::Usage("stop <id>")),
        },
        "extra" => Input::Run(Command::AddExtraTime),
        "bell" => Input::Run(Command::RingBell),
        "present" => {
            let (desired, participant_id) = toggle_args(ctx, args)?;
            Input::Run(Command::MarkPresent {
                participant_id,
                present: desired.unwrap_or(true),
            })
        }
        "bill" => match args {
            [id, title @ ..] if !title.is_empty() => Input::Run(Command::CreateBill(Bill::new(
                BillId::new(*id),
                title.join(" "),
                ctx.name.clone(),
            ))),
            _ => return Err(ParseError::Usage("bill <id> <title...>")),
        },
        "amend" => match args {
            [id, field, value @ ..] if !value.is_empty() => Input::Amend {
                bill_id: BillId::new(*id),
                field: BillField::parse(field).ok_or(ParseError::Usage(AMEND_USAGE))?,
                value: value.join(" "),
            },
            _ => return Err(ParseError::Usage(AMEND_USAGE)),
        },
        "register" => match args {
            [id, party, name @ ..] if !name.is_empty() => {
                Input::Run(Command::RegisterParticipant(Participant::new(
                    ParticipantId::new(*id),
                    name.join(" "),
                    party.to_string(),
                    ctx.city.clone(),
                )))
            }
            _ => return Err(ParseError::Usage("register <id> <party> <name...>")),
        },
        "rename" => match args {
            [id, name @ ..] if !name.is_empty() => Input::Run(Command::UpdateParticipant {
                participant_id: ParticipantId::new(*id),
                profile: ProfileUpdate {
                    name: Some(name.join(" ")),
                    ..Default::default()
                },
            }),
            _ => return Err(ParseError::Usage("rename <id> <name...>")),
        },
        "allow" => match args {
            [ip, city @ ..] => Input::Run(Command::ConfigureChamber {
                city: city_arg(ctx, city),
                // "-" clears the address and puts the chamber in test mode
                allowed_ip: Some(if *ip == "-" { String::new() } else { ip.to_string() }),
                is_active: None,
            }),
            _ => return Err(ParseError::Usage("allow <ip|-> [city]")),
        },
        "activate" => match args.split_first() {
            Some((flag, city)) if switch(flag).is_some() => Input::Run(Command::ConfigureChamber {
                city: city_arg(ctx, city),
                allowed_ip: None,
                is_active: switch(flag),
            }),
            _ => return Err(ParseError::Usage("activate <on|off> [city]")),
        },
        "status" => Input::Status,
        "queue" => Input::Queue,
        "tally" => Input::Tally,
        "bills" => Input::Bills(if args.is_empty() { None } else { Some(args.join(" ")) }),
        "history" => Input::History,
        "stats" => Input::Stats,
        "record" => Input::Record(seat(ctx, args.first())?),
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

/// Build the bill update for an `amend` line from the bill as last seen
pub fn amend(store: &SessionStore, bill_id: &BillId, field: BillField, value: &str) -> Result<Command, ParseError> {
    let mut bill = store
        .bill(bill_id)
        .cloned()
        .ok_or_else(|| ParseError::UnknownBill(bill_id.clone()))?;
    let value = value.to_string();
    match field {
        BillField::Title => bill.title = value,
        BillField::Description => bill.description = value,
        BillField::Author => bill.author = value,
        BillField::Category => bill.category = value,
        BillField::Kind => {
            bill.kind = BillKind::parse(&value).ok_or(ParseError::Usage("amend <id> type <PL|INDICATION>"))?
        }
        BillField::FullText => bill.full_text = value,
    }
    Ok(Command::UpdateBill(bill))
}

fn name_of(store: &SessionStore, id: &ParticipantId) -> String {
    store
        .participant(id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Operator-facing line for a notification, if it deserves one
pub fn describe(note: &Notification, store: &SessionStore) -> Option<String> {
    match note {
        Notification::ActiveBillChanged {
            to: Some(bill),
            navigate_to_session: true,
            ..
        } => {
            let title = store.bill(bill).map(|b| b.title.as_str()).unwrap_or("");
            Some(format!(">> Bill {} is on the floor: {}", bill, title))
        }
        Notification::SpeakerChanged { to: Some(id), .. } => {
            Some(format!(">> {} has the floor", name_of(store, id)))
        }
        Notification::SpeakerChanged { from: Some(id), to: None } => {
            Some(format!(">> {} yielded the floor", name_of(store, id)))
        }
        Notification::VotingOpened(bill) => Some(format!(">> Voting open on {}", bill)),
        Notification::SessionClosed(bill) => {
            let outcome = store
                .history()
                .iter()
                .find(|h| &h.bill_id == bill)
                .map(|h| format!(" ({}, {}-{}-{})", h.result.outcome, h.result.yes, h.result.no, h.result.abstain))
                .unwrap_or_default();
            Some(format!(">> Voting closed on {}{}", bill, outcome))
        }
        Notification::BellRang => Some(">> *** BELL ***".to_string()),
        Notification::ResyncRequired => Some(">> Reconnecting to the chamber...".to_string()),
        _ => None,
    }
}

pub fn render_status(store: &SessionStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Chamber of {}", store.city());
    let phase = store.phase();
    match (&phase, store.active_bill()) {
        (SessionPhase::Idle, _) => {
            let _ = writeln!(out, "  No bill on the floor");
        }
        (_, Some(bill)) => {
            let _ = writeln!(out, "  {} [{}] {} - {}", bill.id, bill.status, bill.title, phase.name());
        }
        (_, None) => {
            let _ = writeln!(out, "  {} - {}", phase.active_bill().map(|b| b.as_str()).unwrap_or("?"), phase.name());
        }
    }
    match store.speech().speaker() {
        Some(id) => {
            let clock = store.clock();
            let warning = if clock.is_exhausted() {
                "  TIME UP".to_string()
            } else {
                format!("  ({}s left)", clock.remaining_secs())
            };
            let _ = writeln!(
                out,
                "  Speaking: {} {} / {:02}:00{}",
                name_of(store, id),
                clock.display(),
                SPEAKING_CEILING_SECS / 60,
                warning
            );
        }
        None => {
            let _ = writeln!(out, "  Nobody holds the floor");
        }
    }
    let _ = write!(
        out,
        "  Present: {}/{}  Queue: {}",
        store.present_count(),
        store.participants().len(),
        store.floor_queue().len()
    );
    out
}

pub fn render_queue(store: &SessionStore) -> String {
    let queue = store.floor_queue();
    if queue.is_empty() {
        return "No floor requests".to_string();
    }
    queue
        .iter()
        .map(|entry| {
            let aside = if entry.is_intervention { " (aparte)" } else { "" };
            format!(
                "{:>2}. {} - {} [{}]{}",
                entry.position, entry.participant.name, entry.participant.party, entry.participant.id, aside
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_tally(store: &SessionStore) -> String {
    let tally = store.tally();
    let mut out = format!(
        "YES {}  NO {}  ABSTAIN {}  PENDING {}  ({}% voted, leaning {})",
        tally.yes,
        tally.no,
        tally.abstain,
        tally.pending,
        tally.progress_percent(),
        tally.outcome()
    );
    for p in store.participants() {
        let _ = write!(out, "\n  {:<24} {:<8} {}", p.name, p.party, p.current_vote);
    }
    out
}

pub fn render_bills(store: &SessionStore, search: Option<&str>) -> String {
    let bills = store.search_bills(search.unwrap_or(""));
    if bills.is_empty() {
        return match search {
            Some(term) => format!("No bills match '{}'", term),
            None => "No bills".to_string(),
        };
    }
    bills
        .iter()
        .map(|b| format!("{:<10} {:<10} {:<11} {}", b.id, b.kind.as_str(), b.status, b.title))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(store: &SessionStore) -> String {
    let entries: Vec<String> = store
        .history()
        .iter()
        .filter(|h| h.city == store.city())
        .map(|h| {
            format!(
                "{} {:<10} {:<8} {}-{}-{}",
                h.date, h.bill_id, h.result.outcome, h.result.yes, h.result.no, h.result.abstain
            )
        })
        .collect();
    if entries.is_empty() {
        "No sessions recorded".to_string()
    } else {
        entries.join("\n")
    }
}

pub fn render_stats(store: &SessionStore) -> String {
    let stats = DashboardStats::compute(store.bills(), store.history(), store.city());
    format!(
        "Pending bills: {}  Approved: {}  Rejected: {}  Participation: {}%",
        stats.pending_bills, stats.approved, stats.rejected, stats.participation_percent
    )
}

pub fn render_record(store: &SessionStore, id: &ParticipantId) -> String {
    let record = VotingRecord::compute(store.history(), id);
    format!(
        "{}: {} sessions, YES {}  NO {}  ABSTAIN {}, aligned with outcome {}%",
        name_of(store, id),
        record.total,
        record.yes,
        record.no,
        record.abstain,
        record.alignment_percent()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plenario_core::Role;

    fn councilman() -> UserContext {
        UserContext::new(Role::Councilman, "Almenara", "Ana").with_participant(ParticipantId::new("c1"))
    }

    fn clerk() -> UserContext {
        UserContext::new(Role::Clerk, "Pedra Azul", "Mesa")
    }

    fn command(line: &str, ctx: &UserContext) -> Command {
        match parse(line, ctx).unwrap() {
            Some(Input::Run(cmd)) => cmd,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   ", &clerk()).unwrap(), None);
    }

    #[test]
    fn test_seat_defaults_to_own() {
        assert_eq!(
            command("vote sim", &councilman()),
            Command::CastVote {
                participant_id: ParticipantId::new("c1"),
                vote: VoteValue::Yes
            }
        );
        assert_eq!(
            command("floor", &councilman()),
            Command::RequestFloor {
                participant_id: ParticipantId::new("c1"),
                desired: None
            }
        );
        assert_eq!(parse("vote no", &clerk()), Err(ParseError::NoSeat));
    }

    #[test]
    fn test_toggle_arguments() {
        assert_eq!(
            command("floor off c7", &clerk()),
            Command::RequestFloor {
                participant_id: ParticipantId::new("c7"),
                desired: Some(false)
            }
        );
        assert_eq!(
            command("aparte c7", &clerk()),
            Command::RequestIntervention {
                participant_id: ParticipantId::new("c7"),
                desired: None
            }
        );
        assert_eq!(
            command("present", &councilman()),
            Command::MarkPresent {
                participant_id: ParticipantId::new("c1"),
                present: true
            }
        );
    }

    #[test]
    fn test_multi_word_arguments() {
        match command("bill PL-12 Reforma da praca", &clerk()) {
            Command::CreateBill(bill) => {
                assert_eq!(bill.id, BillId::new("PL-12"));
                assert_eq!(bill.title, "Reforma da praca");
                assert_eq!(bill.author, "Mesa");
            }
            other => panic!("unexpected {:?}", other),
        }
        match command("register pa-3 PV Maria das Dores", &clerk()) {
            Command::RegisterParticipant(p) => {
                assert_eq!(p.name, "Maria das Dores");
                assert_eq!(p.party, "PV");
                assert_eq!(p.city, "Pedra Azul");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            command("activate off Pedra Azul", &clerk()),
            Command::ConfigureChamber {
                city: "Pedra Azul".into(),
                allowed_ip: None,
                is_active: Some(false)
            }
        );
        assert_eq!(
            command("allow -", &clerk()),
            Command::ConfigureChamber {
                city: "Pedra Azul".into(),
                allowed_ip: Some(String::new()),
                is_active: None
            }
        );
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(parse("vote maybe", &councilman()), Err(ParseError::Usage("vote <yes|no|abstain> [id]")));
        assert_eq!(parse("vote pending", &councilman()), Err(ParseError::Usage("vote <yes|no|abstain> [id]")));
        assert!(matches!(parse("speak", &clerk()), Err(ParseError::Usage(_))));
        assert!(matches!(parse("bill PL-1", &clerk()), Err(ParseError::Usage(_))));
        assert_eq!(parse("dance", &clerk()), Err(ParseError::Unknown("dance".into())));
    }

    #[test]
    fn test_views() {
        assert_eq!(parse("STATUS", &clerk()).unwrap(), Some(Input::Status));
        assert_eq!(parse("record", &councilman()).unwrap(), Some(Input::Record(ParticipantId::new("c1"))));
        assert_eq!(parse("exit", &clerk()).unwrap(), Some(Input::Quit));
    }

    #[test]
    fn test_render_empty_store() {
        let store = SessionStore::new("Almenara");
        assert!(render_status(&store).contains("No bill on the floor"));
        assert_eq!(render_queue(&store), "No floor requests");
        assert_eq!(render_history(&store), "No sessions recorded");
        assert_eq!(describe(&Notification::RosterChanged, &store), None);
        assert_eq!(describe(&Notification::BellRang, &store).as_deref(), Some(">> *** BELL ***"));
    }

    #[test]
    fn test_bills_search_term() {
        assert_eq!(parse("bills", &clerk()).unwrap(), Some(Input::Bills(None)));
        assert_eq!(
            parse("bills praca central", &clerk()).unwrap(),
            Some(Input::Bills(Some("praca central".into())))
        );
    }

    fn store_with_bill() -> SessionStore {
        use plenario_core::{ChangeEvent, ChangeKind};
        let mut store = SessionStore::new("Almenara");
        let bill = Bill::new(BillId::new("PL-12"), "Reforma da praca".into(), "Ver. Ana".into());
        store
            .apply(&ChangeEvent::bill(ChangeKind::Insert, &bill).unwrap(), chrono::Utc::now())
            .unwrap();
        store
    }

    #[test]
    fn test_render_bills_filters() {
        let store = store_with_bill();
        assert!(render_bills(&store, Some("REFORMA")).contains("PL-12"));
        assert_eq!(render_bills(&store, Some("esgoto")), "No bills match 'esgoto'");
        assert!(render_bills(&store, None).contains("Reforma da praca"));
    }

    #[test]
    fn test_amend_builds_bill_update() {
        let store = store_with_bill();
        let (bill_id, field, value) = match parse("amend PL-12 description Nova calcada e bancos", &clerk()).unwrap() {
            Some(Input::Amend { bill_id, field, value }) => (bill_id, field, value),
            other => panic!("expected an amendment, got {:?}", other),
        };
        assert_eq!(field, BillField::Description);
        match amend(&store, &bill_id, field, &value).unwrap() {
            Command::UpdateBill(bill) => {
                assert_eq!(bill.description, "Nova calcada e bancos");
                assert_eq!(bill.title, "Reforma da praca");
            }
            other => panic!("unexpected {:?}", other),
        }

        match amend(&store, &bill_id, BillField::Kind, "indication").unwrap() {
            Command::UpdateBill(bill) => assert_eq!(bill.kind, BillKind::Indication),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(amend(&store, &bill_id, BillField::Kind, "law"), Err(ParseError::Usage(_))));
        assert_eq!(
            amend(&store, &BillId::new("PL-99"), BillField::Title, "x"),
            Err(ParseError::UnknownBill(BillId::new("PL-99")))
        );
        assert!(matches!(parse("amend PL-12 colour red", &clerk()), Err(ParseError::Usage(_))));
    }
}
