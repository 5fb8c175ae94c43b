//! Foundry CLI - drive CBT exercise runs from the command line
//!
//! Main entry point for the foundry command-line tool.

use clap::{Parser, Subcommand};
use foundry::config::LoggingConfig;
use foundry::{load_config, logging, EngineCatalog, RunController, RunState};
use tokio_stream::StreamExt;

#[derive(Parser)]
#[command(name = "foundry")]
#[command(about = "Foundry - resumable, checkpointed CBT exercise pipeline", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run and drive it to the human-approval pause
    Start {
        /// What the exercise should address
        intent: String,
    },

    /// Continue a run from its latest checkpoint
    Resume {
        /// Run ID
        run_id: String,
    },

    /// Approve a paused run and finish it
    Approve {
        /// Run ID
        run_id: String,
        /// Approved text, defaults to the current draft
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Print the latest state of a run
    Status {
        /// Run ID
        run_id: String,
    },

    /// List a run's checkpoints
    History {
        /// Run ID
        run_id: String,
    },

    /// Generate (once) and print a reviewer summary
    Summary {
        /// Run ID
        run_id: String,
    },

    /// Stream progress events until interrupted
    Watch {
        /// Run ID
        run_id: String,
        /// Print server-sent-event frames instead of one line per event
        #[arg(long)]
        sse: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = {
        let _bootstrap = logging::bootstrap(&LoggingConfig::default());
        load_config().await?
    };
    logging::init(&config.logging);

    if let Commands::Config = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        println!("# database file: {}", config.database_path().display());
        return Ok(());
    }

    let controller = RunController::open(&config, &EngineCatalog::new()).await?;

    match cli.command {
        Commands::Start { intent } => {
            let run_id = controller.start(&intent).await?;
            let state = controller.status(&run_id).await?;
            println!("{}", run_id);
            eprintln!("status: {}", state.status);
        }
        Commands::Resume { run_id } => {
            let state = controller.resume(&run_id).await?;
            print_state(&state)?;
        }
        Commands::Approve { run_id, text } => {
            let state = controller.approve(&run_id, text).await?;
            print_state(&state)?;
        }
        Commands::Status { run_id } => {
            let state = controller.status(&run_id).await?;
            print_state(&state)?;
        }
        Commands::History { run_id } => {
            let history = controller.history(&run_id).await?;
            println!("{:<26} {:<16} {}", "Timestamp", "Stage", "Note");
            println!("{}", "-".repeat(80));
            for entry in history {
                println!(
                    "{:<26} {:<16} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    entry.stage_name,
                    entry.note
                );
            }
        }
        Commands::Summary { run_id } => {
            println!("{}", controller.summarize(&run_id).await?);
        }
        Commands::Watch { run_id, sse } => {
            let mut events = controller.watch(&run_id).stream();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.next() => match event {
                        Some(event) if sse => print!("{}", event.to_sse_frame()?),
                        Some(event) => println!("{}", event.description()),
                        None => break,
                    },
                }
            }
        }
        Commands::Config => {}
    }

    Ok(())
}

fn print_state(state: &RunState) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}
