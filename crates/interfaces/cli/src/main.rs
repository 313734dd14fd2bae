use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cogcore_config::{InvocationType, RuntimeConfig};
use cogcore_llm::CliAdapter;
use cogcore_runtime::CoreRuntime;
use cogcore_workspace::paths::WorkspaceRoot;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cogcore", version, about = "A persistent memory-centric AI agent")]
struct Cli {
    /// Workspace directory; defaults to the current directory.
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one message through `think()` and print the response.
    Think {
        message: String,
        #[arg(long, default_value = "cli")]
        chat: String,
    },
    /// Run one `run_heartbeat()` cycle directly.
    Tick,
    /// Print workspace path, trust score/tier, adapter health, proactive state.
    Doctor,
    /// Seed a fresh workspace at the given path.
    Init { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        let workspace = WorkspaceRoot::new(path);
        workspace.seed().await?;
        println!("seeded workspace at {}", path.display());
        return Ok(());
    }

    let workspace = WorkspaceRoot::new(&cli.workspace);
    let config_path = cli.workspace.join("cogcore.toml");
    let config = RuntimeConfig::load_from(&config_path)?;
    let runtime = CoreRuntime::new(workspace.clone(), config).await?;
    runtime
        .register_adapter(std::sync::Arc::new(CliAdapter::new("claude", "claude")))
        .await?;

    match cli.command {
        Commands::Think { message, chat } => {
            let result = runtime.think(&message, &chat, Vec::new(), None, InvocationType::Conversation).await?;
            println!("{}", result.clean_text);
        }
        Commands::Tick => {
            let result = runtime.run_heartbeat().await;
            println!("phase: {:?}", result.phase);
            println!("reason: {}", result.reason);
        }
        Commands::Doctor => {
            let (trust_score, allowed_tiers, frozen) = runtime.trust_summary().await;
            println!("cogcore doctor");
            println!("- workspace path: {}", workspace.root().display());
            println!("- trust score: {trust_score:.2}");
            println!("- allowed tiers: {allowed_tiers:?}");
            println!("- trust frozen: {frozen}");

            let health = runtime.health_check_all().await;
            if health.is_empty() {
                println!("- adapters: (none registered)");
            } else {
                for (name, status) in health {
                    println!("- adapter {name}: healthy={} {}", status.healthy, status.message.unwrap_or_default());
                }
            }
        }
        Commands::Init { .. } => unreachable!("handled above"),
    }

    runtime.shutdown().await;
    Ok(())
}
