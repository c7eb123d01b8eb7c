use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kirac_cli::app_state::AppState;
use kirac_cli::{commands, readline};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), String> {
    let _log_guard = init_tracing();

    let state = Arc::new(RwLock::new(AppState::new()));

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    state.write().await.stop_background_tasks();
    Ok(())
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = dirs::data_local_dir().map(|d| d.join("kirac").join("logs"));

    match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "kirac.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        }
    }
}

#[derive(Parser)]
#[command(version, about = "map run tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the client log and track runs live.
    Watch {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Backfill runs from an existing log file.
    ParseFile {
        #[arg(short, long)]
        path: String,
    },
    /// List recent completed runs.
    Runs {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one run in full.
    Run {
        #[arg(short, long)]
        id: i64,
    },
    Config,
    SetDirectory {
        #[arg(short, long)]
        path: String,
    },
    SetCharacter {
        #[arg(short, long)]
        name: String,
    },
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<AppState>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "kirac".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Watch { path }) => commands::watch(path.as_deref(), state).await,
        Some(Commands::ParseFile { path }) => commands::parse_file(path, state).await,
        Some(Commands::Runs { limit }) => commands::list_runs(*limit, state).await,
        Some(Commands::Run { id }) => commands::show_run(*id, state).await,
        Some(Commands::Config) => commands::show_settings(state).await,
        Some(Commands::SetDirectory { path }) => commands::set_directory(path, state).await,
        Some(Commands::SetCharacter { name }) => commands::set_character(name, state).await,
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
