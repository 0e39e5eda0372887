use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use uuid::Uuid;

use study_coach_chat::common::ChatMessage;
use study_coach_chat::config::{self, AppConfig};
use study_coach_chat::page::{PageOutcome, PreparationPage, PreparationRenderer, PreparationView};
use study_coach_chat::routing::{PreparationRoute, RouteError};
use study_coach_chat::session::{CustomSessionStore, SessionTracker};
use study_coach_chat::storage::models::SessionBatch;
use study_coach_chat::storage::{ChatDatabase, PersistedMessage, StorageError};
use study_coach_chat::{NormalizeError, db_messages_to_client_format, try_db_messages_to_client_format};

#[derive(Parser)]
#[command(
    name = "study_coach_chat",
    version,
    about = "Study coach chat history tools"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a JSON array of stored messages into client messages
    Normalize {
        /// Read from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Fail on unparseable timestamps instead of emitting null
        #[arg(long)]
        strict: bool,
    },
    /// Print the client messages of a stored session
    History {
        session_id: String,
        #[arg(long)]
        strict: bool,
    },
    /// Merge a client transcript into a session
    Import {
        /// Session id; a new one is generated when omitted
        #[arg(long)]
        session: Option<String>,
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        study_mode: bool,
        #[arg(long)]
        title: Option<String>,
    },
    /// List a student's sessions
    Sessions {
        #[arg(long)]
        user: String,
        #[arg(long, requires = "deadline")]
        course: Option<String>,
        #[arg(long, requires = "course")]
        deadline: Option<String>,
    },
    /// Soft-delete a session
    Delete { session_id: String },
    /// Open a preparation page path, e.g. /preparation/1/prep_1
    Open {
        path: String,
        /// Also list this student's sessions for the deadline
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the last opened preparation session
    LastSession,
    /// Forget the last opened preparation session
    ClearSession,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(StorageError::Sql(err))
    }
}

fn main() {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).with_env();

    if let Err(err) = run(cli.command, &app_config) {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Command, app_config: &AppConfig) -> Result<(), AppError> {
    match command {
        Command::Normalize { input, strict } => {
            let records: Vec<PersistedMessage> = serde_json::from_str(&read_input(input)?)?;
            print_messages(&records, strict)
        }
        Command::History { session_id, strict } => {
            let db = open_db(app_config)?;
            let records = db.get_messages(&session_id)?;
            print_messages(&records, strict)
        }
        Command::Import {
            session,
            input,
            user,
            course,
            deadline,
            study_mode,
            title,
        } => {
            let messages: Vec<ChatMessage> = serde_json::from_str(&read_input(input)?)?;
            let batch = SessionBatch {
                session_id: session.unwrap_or_else(|| Uuid::new_v4().to_string()),
                user_id: user,
                course_id: course,
                deadline_id: deadline,
                study_mode,
                title,
                messages,
            };
            let mut db = open_db(app_config)?;
            let saved = db.save_session_with_messages(&batch)?;
            println!("saved {saved} new messages to {}", batch.session_id);
            Ok(())
        }
        Command::Sessions {
            user,
            course,
            deadline,
        } => {
            let db = open_db(app_config)?;
            let sessions = match (course, deadline) {
                (Some(course), Some(deadline)) => {
                    db.get_sessions_by_deadline(&user, &course, &deadline)?
                }
                _ => db.get_student_sessions(&user)?,
            };
            println!("{}", serde_json::to_string_pretty(&sessions)?);
            Ok(())
        }
        Command::Delete { session_id } => {
            let db = open_db(app_config)?;
            if db.delete_session(&session_id)? {
                println!("deleted {session_id}");
            } else {
                println!("no session {session_id}");
            }
            Ok(())
        }
        Command::Open { path, user } => {
            let route = PreparationRoute::from_path(&path)?;
            let db = match &user {
                Some(_) => Some(open_db(app_config)?),
                None => None,
            };
            let mut renderer = TextRenderer {
                db: db.as_ref(),
                user: user.as_deref(),
            };
            let page = PreparationPage::new(
                SessionTracker::new(&app_config.session_file),
                CustomSessionStore::new(&app_config.custom_sessions_file),
            );
            if let PageOutcome::Redirect(target) = page.open(&route, &mut renderer) {
                println!("redirect: {target}");
            }
            Ok(())
        }
        Command::LastSession => {
            match SessionTracker::new(&app_config.session_file).last_session() {
                Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
                None => println!("no session tracked"),
            }
            Ok(())
        }
        Command::ClearSession => {
            SessionTracker::new(&app_config.session_file).clear_session()?;
            Ok(())
        }
    }
}

fn open_db(app_config: &AppConfig) -> Result<ChatDatabase, AppError> {
    study_coach_chat::storage::ensure_parent_dir(&app_config.database_path)?;
    Ok(ChatDatabase::with_path(&app_config.database_path)?)
}

fn read_input(input: Option<PathBuf>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn print_messages(records: &[PersistedMessage], strict: bool) -> Result<(), AppError> {
    let messages = if strict {
        try_db_messages_to_client_format(records)?
    } else {
        db_messages_to_client_format(records)
    };
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

/// Prints the preparation view to stdout.
struct TextRenderer<'a> {
    db: Option<&'a ChatDatabase>,
    user: Option<&'a str>,
}

impl PreparationRenderer for TextRenderer<'_> {
    fn render(&mut self, view: PreparationView) {
        println!("Preparation: course {} / {}", view.course_id, view.deadline_id);
        if let Some(session) = &view.custom_session {
            let title = session.title.as_deref().unwrap_or("(untitled)");
            println!("Custom session: {title}");
        }

        let (Some(db), Some(user)) = (self.db, self.user) else {
            return;
        };
        match db.get_sessions_by_deadline(user, &view.course_id, &view.deadline_id) {
            Ok(sessions) if sessions.is_empty() => println!("No previous chats"),
            Ok(sessions) => {
                for session in sessions {
                    let count = db.message_count(&session.session_id).unwrap_or(0);
                    println!(
                        "  {}  {}  ({count} messages)",
                        session.session_id,
                        session.title.as_deref().unwrap_or("")
                    );
                }
            }
            Err(err) => log::warn!("Failed to list sessions for {user}: {err}"),
        }
    }
}
