//! Hearth CLI — the main entry point.
//!
//! Commands:
//! - `run`    — execute a single task in a chat
//! - `chats`  — list saved chats
//! - `memory` — show memory scope statistics
//!
//! Exit codes: 0 normal, 1 fatal initialization failure (endpoint
//! missing, corrupt memory index for the startup scope).

use clap::{Parser, Subcommand};
use hearth_agent::{Agent, AgentConfig, TaskOutcome, DEFAULT_CHAT};
use hearth_config::Settings;
use hearth_llm::LocalEndpointModel;
use hearth_memory::{HashingEmbedder, MemoryManager};
use hearth_store::ChatStore;
use hearth_tools::{default_registry, ActiveChat};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "hearth",
    about = "Hearth — a local-LLM ReAct agent with tiered memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task
    Run {
        /// The task for the agent
        message: String,

        /// Chat to run the task in
        #[arg(short, long, default_value = DEFAULT_CHAT)]
        chat: String,

        /// Save the chat under this description afterwards
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List saved chats
    Chats,

    /// Show memory scope statistics
    Memory,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();

    if let Err(e) = init_logging(&settings, cli.verbose) {
        eprintln!("fatal: could not initialize logging: {e}");
        return ExitCode::from(1);
    }
    info!(?settings, "hearth starting");

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(settings: &Settings, verbose: bool) -> std::io::Result<()> {
    let logs_dir = settings.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    let log_path = logs_dir.join(format!(
        "agent_{}.log",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    ));
    let file = std::fs::File::create(log_path)?;

    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(cli: Cli, settings: Settings) -> Result<(), String> {
    let embedder = Arc::new(HashingEmbedder::default());
    let memory = Arc::new(MemoryManager::new(
        settings.data_dir.clone(),
        embedder.clone(),
    ));
    let store = ChatStore::new(settings.chats_dir());

    match cli.command {
        Commands::Run {
            message,
            chat,
            description,
        } => {
            let llm = Arc::new(LocalEndpointModel::new(
                settings.model_url.clone(),
                settings.model_name.clone(),
                settings.context_window,
            ));
            let active_chat: ActiveChat = Arc::new(RwLock::new(DEFAULT_CHAT.to_string()));
            let mut registry = default_registry(memory.clone(), active_chat.clone(), embedder);
            registry.set_timeout(std::time::Duration::from_secs(settings.tool_timeout_secs));
            let tools = Arc::new(registry);

            let config = AgentConfig {
                max_cycles: settings.max_cycles,
                ..AgentConfig::default()
            };
            let mut agent = Agent::new(llm, memory, tools, store, active_chat, config);

            if chat != DEFAULT_CHAT {
                if agent.switch_chat(&chat).await.is_err() {
                    agent
                        .new_chat(&chat)
                        .await
                        .map_err(|e| format!("could not create chat '{chat}': {e}"))?;
                }
            }

            match agent.run_task(&message).await {
                TaskOutcome::Finished { answer, cycles } => {
                    println!("{answer}");
                    info!(cycles, "task finished");
                }
                TaskOutcome::CycleLimit {
                    last_thought,
                    last_observation,
                } => {
                    println!("cycle limit reached without a final answer.");
                    println!("last thought: {last_thought}");
                    println!("last observation: {last_observation}");
                }
                TaskOutcome::Aborted { reason } => {
                    return Err(format!("task aborted: {reason}"));
                }
            }

            if let Some(description) = description {
                agent
                    .save_current(Some(&description))
                    .map_err(|e| format!("could not save chat: {e}"))?;
            }
            Ok(())
        }

        Commands::Chats => {
            let chats = store.list();
            if chats.is_empty() {
                println!("no saved chats.");
                return Ok(());
            }
            for chat in chats {
                let desc = if chat.description.is_empty() {
                    String::new()
                } else {
                    format!(" — {}", chat.description)
                };
                println!(
                    "{} ({} messages, saved {}){desc}",
                    chat.name,
                    chat.messages_count,
                    chat.last_saved.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }

        Commands::Memory => {
            // Touch the global scope so a fresh install still reports it.
            let _ = memory.list(&hearth_core::MemoryScope::Global).await;
            for stat in memory.stats().await {
                let flag = if stat.disabled { " [disabled]" } else { "" };
                println!(
                    "{}: {} records at {}{flag}",
                    stat.scope,
                    stat.records,
                    stat.storage_path.display()
                );
            }
            Ok(())
        }
    }
}
