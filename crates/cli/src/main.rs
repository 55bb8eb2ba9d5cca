use anyhow::Result;
use clap::{Parser, Subcommand};

use waymark_config::{Config, FileStore, ProviderKind, SettingsStore};

#[derive(Parser)]
#[command(name = "waymark", about = "Adaptive learning chat in the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Provider to use (groq, gemini, glm)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model id (defaults to the provider's default)
    #[arg(short, long)]
    model: Option<String>,

    /// Resume a saved session by id
    #[arg(short, long)]
    resume: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List chat models available for the active provider
    Models,
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List saved sessions, newest first
    List,
    /// Delete a saved session
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("waymark=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    Config::ensure_dirs()?;

    let store = FileStore::open(FileStore::default_path())?;

    // Resuming a session pins the provider it was recorded with; otherwise
    // the flag wins, then the last selection, then the config default.
    let resume = match &cli.resume {
        Some(id) => Some(waymark_core::session::load_session(id)?),
        None => None,
    };

    let kind: ProviderKind = if let Some(flag) = &cli.provider {
        flag.parse()?
    } else if let Some(session) = &resume {
        session
            .meta
            .provider
            .parse()
            .unwrap_or(config.provider.active)
    } else if let Some(last) = store.get("last_provider") {
        last.parse().unwrap_or(config.provider.active)
    } else {
        config.provider.active
    };

    if let Some(model) = &cli.model {
        config.provider.entry_mut(kind).model = Some(model.clone());
    }

    match cli.command {
        Some(Commands::Models) => {
            let provider = waymark_provider::create_provider(kind, &config)?;
            let models = provider.list_models().await?;
            if models.is_empty() {
                println!("no chat models reported by {kind}");
            }
            for m in models {
                println!("{:<40} {}", m.id, m.display_name);
            }
        }
        Some(Commands::Sessions { command }) => match command {
            SessionCommands::List => {
                let sessions = waymark_core::session::list_sessions()?;
                if sessions.is_empty() {
                    println!("no saved sessions");
                }
                for meta in sessions {
                    let topic = if meta.topic.is_empty() {
                        "(untitled)"
                    } else {
                        &meta.topic
                    };
                    println!(
                        "{}  [{}] {} · {} messages · {} · {}",
                        meta.id,
                        meta.phase.as_str(),
                        topic,
                        meta.message_count,
                        meta.provider,
                        meta.updated_at.format("%Y-%m-%d %H:%M"),
                    );
                }
            }
            SessionCommands::Delete { id } => {
                waymark_core::session::delete_session(&id)?;
                println!("deleted {id}");
            }
        },
        Some(Commands::Config) => {
            println!("Config path: {}", Config::config_path().display());
            println!("{}", toml::to_string_pretty(&config)?);
        }
        None => {
            let provider = waymark_provider::create_provider(kind, &config)?;

            store.set("last_provider", kind.as_str())?;
            if let Some(model) = &config.provider.entry(kind).model {
                store.set("last_model", model)?;
            }

            let mut app = waymark_tui::App::new(provider, &config, resume);
            app.run().await?;
        }
    }

    Ok(())
}
