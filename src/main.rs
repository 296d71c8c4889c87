// Command line entry point: check a target's connection or run a statement

use azure_dw_adapter::config::{ProfilesFile, PROFILES_FILE_NAME};
use azure_dw_adapter::logging::init_tracing;
use azure_dw_adapter::{AdapterError, AzureDataWarehouseAdapter};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "azure-dw-adapter", version, about = "Azure SQL Data Warehouse connection adapter")]
struct Cli {
    /// Directory containing profiles.yml
    #[arg(long, env = "DBT_PROFILES_DIR")]
    profiles_dir: Option<PathBuf>,

    /// Profile to read credentials from
    #[arg(long, default_value = "default")]
    profile: String,

    /// Target within the profile (defaults to the profile's target)
    #[arg(long)]
    target: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a connection and run a trivial query
    Debug,

    /// Run one statement on the master connection
    Query {
        sql: String,

        /// Print the returned rows
        #[arg(long)]
        fetch: bool,

        /// Wrap the statement in a transaction and commit it
        #[arg(long)]
        transaction: bool,
    },
}

fn run(cli: Cli) -> Result<(), AdapterError> {
    let path = match cli.profiles_dir {
        Some(dir) => dir.join(PROFILES_FILE_NAME),
        None => ProfilesFile::default_path()?,
    };
    let profiles = ProfilesFile::load(&path)?;
    let target = profiles.resolve(&cli.profile, cli.target.as_deref())?;

    for (key, value) in target.credentials.connection_keys() {
        tracing::info!("{}: {}", key, value);
    }

    let adapter = AzureDataWarehouseAdapter::from_credentials(target.credentials)?;
    let result = match cli.command {
        Commands::Debug => adapter.execute("select 1 as id", false, true).map(|(status, _)| {
            println!("Connection test: {}", status);
        }),
        Commands::Query {
            sql,
            fetch,
            transaction,
        } => adapter
            .execute(&sql, transaction, fetch)
            .and_then(|(status, table)| {
                if transaction {
                    adapter.commit(azure_dw_adapter::db::DEFAULT_CONNECTION_NAME)?;
                }
                println!("{}", status);
                if let Some(table) = table {
                    let json = serde_json::to_string_pretty(&table)
                        .map_err(|e| AdapterError::RuntimeExecution(e.to_string()))?;
                    println!("{}", json);
                }
                Ok(())
            }),
    };

    adapter.cleanup_connections();
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
