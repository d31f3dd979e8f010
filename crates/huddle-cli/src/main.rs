use std::path::PathBuf;

use clap::{Parser, Subcommand};
use huddle_cli::cli::{run_command, CliCommand, CliConfig, Response};
use huddle_core::CoreError;

#[derive(Parser)]
#[command(name = "huddle-cli")]
#[command(about = "Diagnostic driver for the huddle sync engine")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (dataDir, reviewers, leads, ...)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run several clients against one in-memory store and check convergence
    Simulate {
        /// Number of clients (defaults to the config value)
        #[arg(long, short = 'n')]
        clients: Option<usize>,
        /// Number of tasks to create
        #[arg(long, short = 't', default_value_t = 10)]
        tasks: usize,
        /// Fail every n-th task write
        #[arg(long)]
        fail_every: Option<usize>,
    },

    /// Admit display names in order and report who gets in
    Presence {
        /// Names to admit (can be repeated)
        names: Vec<String>,
    },

    /// Import a CSV file of tasks and export it back
    CsvRoundTrip {
        /// CSV file with a title,description,... header
        input: PathBuf,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    huddle_core::tracing_setup::init_tracing_with_service("huddle-cli");

    let config = load_config(&cli);

    let command = match cli.command {
        Some(Commands::Simulate {
            clients,
            tasks,
            fail_every,
        }) => CliCommand::Simulate {
            clients,
            tasks,
            fail_every,
        },
        Some(Commands::Presence { names }) => CliCommand::Presence { names },
        Some(Commands::CsvRoundTrip { input }) => CliCommand::CsvRoundTrip { input },
        Some(Commands::ShowConfig) => CliCommand::ShowConfig,
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let response = match run_command(command, &config).await {
        Ok(result) => Response::success(result),
        Err(e) => Response::error(error_code(&e), &format!("{:#}", e)),
    };

    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if response.is_error() {
        std::process::exit(1);
    }
}

/// Load configuration from file, or defaults when no file is given
fn load_config(cli: &Cli) -> CliConfig {
    match cli.config {
        Some(ref path) => match CliConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        None => CliConfig::default(),
    }
}

fn error_code(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<CoreError>() {
        Some(CoreError::WriteFailed { .. }) => "write_failed",
        Some(CoreError::ChannelDisconnected { .. }) => "channel_disconnected",
        Some(CoreError::NotFound { .. }) => "not_found",
        Some(CoreError::ProtectedBoard { .. }) => "protected_board",
        Some(CoreError::NotPermitted { .. }) => "not_permitted",
        Some(CoreError::InvalidInput(_)) => "invalid_input",
        Some(_) => "core_error",
        None => "error",
    }
}
