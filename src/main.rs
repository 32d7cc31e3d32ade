//! CLI binary for vivo-fluent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vivo_fluent::conversation::{Effect, Role};
use vivo_fluent::replay::{parse_script, replay};
use vivo_fluent::session::{self, ConversationSession, SessionManager};
use vivo_fluent::voice::RecordingProvider;
use vivo_fluent::{Config, ConversationRuntime, Scenario};

/// vivo-fluent: role-play language practice over a voice AI service.
#[derive(Parser)]
#[command(name = "vivo-fluent", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scripted conversation (JSON Lines) against a scenario.
    Replay {
        /// Scenario definition (TOML).
        #[arg(long)]
        scenario: PathBuf,

        /// Script of voice service messages and user commands.
        #[arg(long)]
        events: PathBuf,

        /// Keep sessions in memory instead of the configured store.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Inspect and manage saved sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Print common phrases of the configured target language.
    Phrases,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved sessions, newest first.
    List {
        /// Only sessions of this scenario id.
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Print a session as JSON.
    Show { id: String },
    /// Make a saved session current so the next run resumes it.
    Resume { id: String },
    /// Delete a session.
    Delete { id: String },
    /// Print the current session summary.
    Current,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vivo_fluent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Replay {
            scenario,
            events,
            ephemeral,
        } => run_replay(&config, &scenario, &events, ephemeral).await,
        Command::Sessions { action } => run_sessions(&config, action),
        Command::Phrases => run_phrases(&config),
    }
}

fn session_manager(config: &Config, ephemeral: bool) -> Result<SessionManager> {
    let backend = if ephemeral {
        "memory"
    } else {
        config.storage.backend.as_str()
    };
    let store = session::open_store(backend, &config.storage.resolved_path())
        .context("Failed to open session store")?;
    Ok(SessionManager::new(store).with_max_sessions(config.session.max_sessions))
}

async fn run_replay(
    config: &Config,
    scenario: &Path,
    events: &Path,
    ephemeral: bool,
) -> Result<()> {
    let scenario = Scenario::from_file(scenario)?;
    let script = std::fs::read_to_string(events)
        .with_context(|| format!("Failed to read replay script: {}", events.display()))?;
    let steps = parse_script(&script)
        .with_context(|| format!("Invalid replay script: {}", events.display()))?;

    let target = config.language.pair()?.target;
    let sessions = session_manager(config, ephemeral)?;
    let provider = Arc::new(RecordingProvider::new());
    let (observer_tx, mut observer_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut runtime = ConversationRuntime::new(scenario, config, sessions, provider.clone())?
        .with_observer(observer_tx);

    println!("vivo-fluent v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Scenario: {} ({})\n",
        runtime.scenario().title,
        runtime.scenario().assistant_name()
    );

    runtime.connect().await?;
    replay(&mut runtime, steps).await;
    runtime.shutdown();

    while let Ok(effect) = observer_rx.try_recv() {
        match effect {
            Effect::MessageAppended(message) => {
                println!("  {:>9}: {}", message.role.as_str(), message.content);
                if message.role == Role::Assistant {
                    if let Some(hint) = target.translation_hint(&message.content) {
                        println!("  {:>9}  ({hint})", "");
                    }
                }
            }
            Effect::Suggestions(suggestions) => {
                for s in suggestions {
                    println!("  {:>9}  try: {} ({})", "", s.text, s.translation);
                }
            }
            Effect::Notify(notice) => {
                println!("  [{}] {}", notice.title, notice.message);
            }
            _ => {}
        }
    }

    let engine = runtime.engine();
    println!("\nObjectives:");
    for objective in engine.objectives() {
        let mark = if objective.completed { "x" } else { " " };
        println!("  [{mark}] {}", objective.text);
    }

    println!("\nFeedback:");
    for item in engine.feedback().items() {
        println!(
            "  pron {:>3}  gram {:>3}  flu {:>3}  {}",
            item.pronunciation_score, item.grammar_score, item.fluency_score, item.german_text
        );
        for point in &item.strong_points {
            println!("      + {point}");
        }
        for suggestion in &item.suggestions {
            println!("      - {suggestion}");
        }
    }
    if let Some(average) = engine.feedback().average_score() {
        println!("  average: {average}");
    }

    println!("\nProvider calls: {}", provider.calls().len());
    if let Some(session) = runtime.sessions().current_session() {
        print_summary(&session);
    }
    Ok(())
}

fn run_sessions(config: &Config, action: SessionsAction) -> Result<()> {
    let sessions = session_manager(config, false)?;
    match action {
        SessionsAction::List { scenario } => {
            let mut list = match scenario {
                Some(id) => sessions.sessions_by_scenario(&id),
                None => sessions.all_sessions(),
            };
            list.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
            if list.is_empty() {
                println!("No saved sessions.");
            }
            for s in list {
                let status = if s.is_complete { "complete" } else { "in progress" };
                println!(
                    "{}  {}  {} turns  {}",
                    s.id, s.scenario_title, s.turn_count, status
                );
            }
        }
        SessionsAction::Show { id } => match sessions
            .all_sessions()
            .into_iter()
            .find(|s| s.id == id)
        {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => anyhow::bail!("Session not found: {id}"),
        },
        SessionsAction::Resume { id } => match sessions.load_session(&id) {
            Some(session) => print_summary(&session),
            None => anyhow::bail!("Session not found: {id}"),
        },
        SessionsAction::Delete { id } => {
            if sessions.delete_session(&id) {
                println!("Deleted {id}");
            } else {
                anyhow::bail!("Session not found: {id}");
            }
        }
        SessionsAction::Current => match sessions.current_session() {
            Some(session) => print_summary(&session),
            None => println!("No current session."),
        },
    }
    Ok(())
}

fn run_phrases(config: &Config) -> Result<()> {
    let target = config.language.pair()?.target;
    let phrases = target.common_phrases();
    if phrases.is_empty() {
        println!("No common phrases for {} yet.", target.display_name());
        return Ok(());
    }
    println!("Common {} phrases:", target.display_name());
    for (phrase, meaning) in phrases {
        println!("  {phrase:<20} {meaning}");
    }
    Ok(())
}

fn print_summary(session: &ConversationSession) {
    let stats = session.stats();
    println!("\nSession {}", session.id);
    println!("  scenario:   {}", session.scenario_title);
    println!(
        "  messages:   {} ({} user, {} assistant)",
        stats.total_messages, stats.user_messages, stats.assistant_messages
    );
    println!(
        "  objectives: {}/{}",
        stats.completed_objectives, stats.total_objectives
    );
    println!("  duration:   {}", stats.duration);
    println!("  complete:   {}", session.is_complete);
}
