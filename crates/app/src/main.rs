//! Plenario - municipal chamber session terminal
//!
//! Headless console for one chamber: the chair runs the agenda and the
//! floor, councilmen vote and ask to speak, and every terminal follows
//! the shared session through the change feed.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use plenario_core::{ChangeSource, Command, Notification, SessionController, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod console;
mod state;
mod ticker;

use config::AppConfig;
use console::Input;
use state::AppState;
use ticker::SpeakingTimer;

fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("plenario: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!(city = %config.city, role = %config.user.role, "Starting Plenario");

    let db_path = match config.database_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to resolve data directory: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::open(config, &db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(app_state)) {
        tracing::error!("Session terminal stopped: {}", e);
        std::process::exit(1);
    }
}

/// Sign in, load the chamber and serve the console until stdin closes
async fn run(app: AppState) -> plenario_core::Result<()> {
    let mut store = SessionStore::new(app.city());

    // Subscribe before the baseline fetch so nothing falls in between
    let mut feed = app.db().subscribe(app.city());
    {
        let db = app.db();
        let controller = SessionController::new(&*db);
        let resync_notes = controller.resync(&mut store, Utc::now())?;
        print_notes(&store, &resync_notes);
        let signed_in = controller.sign_in(&app.user, &mut store, app.config.client_ip.as_deref(), Utc::now())?;
        tracing::info!(home = ?signed_in.home, "Signed in");
        print_notes(&store, &signed_in.notifications);
    }
    println!("{}", console::render_status(&store));

    let (tick_tx, mut tick_rx) = mpsc::channel(4);
    let mut timer = SpeakingTimer::new(Duration::from_millis(app.config.tick_interval_ms), tick_tx);
    timer.sync(store.clock().is_running());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut warned_exhausted = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read console input: {}", e);
                        break;
                    }
                };
                if !handle_line(&app, &mut store, &line) {
                    break;
                }
            }
            item = feed.recv() => {
                let Some(item) = item else {
                    tracing::warn!("Change feed closed");
                    break;
                };
                let notes = match store.apply_item(&item, Utc::now()) {
                    Ok(notes) => notes,
                    Err(e) => {
                        // An undecodable row leaves the store behind the backend
                        tracing::warn!("Dropping change event: {}", e);
                        vec![Notification::ResyncRequired]
                    }
                };
                print_notes(&store, &notes);
                if notes.contains(&Notification::ResyncRequired) {
                    resync(&app, &mut store)?;
                }
            }
            Some(()) = tick_rx.recv() => {
                store.tick(Utc::now());
                let clock = store.clock();
                if clock.is_exhausted() && !warned_exhausted {
                    println!(">> Speaking time is up ({})", clock.display());
                    warned_exhausted = true;
                }
            }
        }

        if !store.clock().is_exhausted() {
            warned_exhausted = false;
        }
        timer.sync(store.clock().is_running());
    }

    tracing::info!("Console closed");
    Ok(())
}

/// Returns false when the operator asked to quit
fn handle_line(app: &AppState, store: &mut SessionStore, line: &str) -> bool {
    let input = match console::parse(line, &app.user) {
        Ok(Some(input)) => input,
        Ok(None) => return true,
        Err(e) => {
            println!("{}", e);
            return true;
        }
    };

    match input {
        Input::Run(command) => run_command(app, store, command),
        Input::Amend {
            bill_id,
            field,
            value,
        } => match console::amend(store, &bill_id, field, &value) {
            Ok(command) => run_command(app, store, command),
            Err(e) => println!("{}", e),
        },
        Input::Status => println!("{}", console::render_status(store)),
        Input::Queue => println!("{}", console::render_queue(store)),
        Input::Tally => println!("{}", console::render_tally(store)),
        Input::Bills(search) => println!("{}", console::render_bills(store, search.as_deref())),
        Input::History => println!("{}", console::render_history(store)),
        Input::Stats => println!("{}", console::render_stats(store)),
        Input::Record(id) => println!("{}", console::render_record(store, &id)),
        Input::Help => println!("{}", console::HELP),
        Input::Quit => return false,
    }
    true
}

fn run_command(app: &AppState, store: &mut SessionStore, command: Command) {
    let db = app.db();
    let controller = SessionController::new(&*db);
    match controller.execute(&app.user, store, command, Utc::now()) {
        Ok(notes) => print_notes(store, &notes),
        Err(e) => {
            println!("!! {}", e);
            if e.is_retryable() {
                println!("   Nothing was saved; repeat the command to retry");
            }
        }
    }
}

fn resync(app: &AppState, store: &mut SessionStore) -> plenario_core::Result<()> {
    let db = app.db();
    let notes = SessionController::new(&*db).resync(store, Utc::now())?;
    tracing::info!("Baseline reloaded after lost events");
    print_notes(store, &notes);
    Ok(())
}

fn print_notes(store: &SessionStore, notes: &[Notification]) {
    for note in notes {
        if let Some(line) = console::describe(note, store) {
            println!("{}", line);
        }
    }
}
