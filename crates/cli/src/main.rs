//! File Ledger Command Line Interface
//!
//! Runs ledger operations against a local sled database. Every command prints
//! pretty JSON on stdout; logs go to stderr.

mod config;

use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fileledger_files::{FileLedger, LedgerError, TracingEventSink};
use fileledger_storage::{export_snapshot, import_snapshot, SledLedgerStore};
use fileledger_types::{Address, CallerContext, FileId, FileUpdate, NewFile};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "fileledger")]
#[command(about = "Access-controlled, versioned file ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to config/fileledger.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ledger database directory, overrides `data_dir` from the configuration
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Address the command acts as (required for mutating commands)
    #[arg(long, value_name = "ADDRESS")]
    caller: Option<Address>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new file owned by the caller
    Upload(UploadCommand),
    /// Replace the live content of a file
    Update {
        file_id: FileId,
        content_hash: String,
        size: u64,
        metadata_cid: String,
    },
    /// Restore an earlier version (0-based index) as the newest version
    Rollback { file_id: FileId, version_index: u64 },
    /// Permanently deactivate a file
    Deactivate { file_id: FileId },
    /// Grant read and/or write access (both flags commit as one grant)
    Grant(GrantCommand),
    /// Revoke every permission of an address
    Revoke { file_id: FileId, address: Address },
    /// Show a file record
    Info { file_id: FileId },
    /// List files created by an address
    Files { address: Address },
    /// Show the raw grant of an address on a file
    Access { file_id: FileId, address: Address },
    /// Check read access
    CanRead { file_id: FileId, address: Address },
    /// Check write access
    CanWrite { file_id: FileId, address: Address },
    /// Show the version history of a file
    Versions { file_id: FileId },
    /// List addresses ever granted access to a file
    Users {
        file_id: FileId,
        /// Only addresses that can read right now
        #[arg(long)]
        active: bool,
    },
    /// Look up the file a content hash belongs to
    Hash { content_hash: String },
    /// Number of files ever registered
    Total,
    /// Replay the event log
    Events {
        /// First sequence number to return
        #[arg(long, default_value_t = 1)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Snapshot maintenance
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },
}

#[derive(Args)]
struct UploadCommand {
    content_hash: String,
    file_name: String,
    size: u64,
    metadata_cid: String,
    /// Mark the content as client-side encrypted
    #[arg(long, requires = "master_key_hash")]
    encrypted: bool,
    /// Hash of the key the content is encrypted under
    #[arg(long)]
    master_key_hash: Option<String>,
}

#[derive(Args)]
struct GrantCommand {
    file_id: FileId,
    address: Address,
    #[arg(long)]
    read: bool,
    #[arg(long)]
    write: bool,
    /// Unix seconds at which the grant stops applying (0 = never)
    #[arg(long, default_value_t = 0)]
    expires_at: u64,
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Write manifest.json and ledger.json into a directory
    Export { dir: PathBuf },
    /// Restore a snapshot directory into an empty ledger
    Import { dir: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<LedgerError>()
                .map(LedgerError::kind)
                .unwrap_or("Error");
            let body = json!({ "error": { "kind": kind, "message": format!("{err:#}") } });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut app_config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        app_config.data_dir = data_dir;
    }
    init_logging(&app_config)?;

    let store = SledLedgerStore::new(&app_config.data_dir).with_context(|| {
        format!(
            "Failed to open ledger database at {}",
            app_config.data_dir.display()
        )
    })?;
    let ledger = FileLedger::new(store)
        .with_config(app_config.ledger_config())
        .with_sink(Arc::new(TracingEventSink));

    execute(&ledger, cli.caller, cli.command)
}

fn execute(
    ledger: &FileLedger<SledLedgerStore>,
    caller: Option<Address>,
    command: Commands,
) -> Result<()> {
    let require_caller = || -> Result<CallerContext> {
        caller
            .map(CallerContext::new)
            .context("--caller is required for this command")
    };

    match command {
        Commands::Upload(cmd) => {
            let file = NewFile {
                content_hash: cmd.content_hash,
                file_name: cmd.file_name,
                file_size: cmd.size,
                metadata_cid: cmd.metadata_cid,
                is_encrypted: cmd.encrypted,
                master_key_hash: cmd.master_key_hash,
            };
            let file_id = ledger.upload(&require_caller()?, file)?;
            print_json(&json!({ "file_id": file_id }))?;
        }
        Commands::Update {
            file_id,
            content_hash,
            size,
            metadata_cid,
        } => {
            let update = FileUpdate::new(content_hash, size, metadata_cid);
            ledger.update_file(&require_caller()?, file_id, update)?;
            print_json(&ledger.file_info(file_id)?)?;
        }
        Commands::Rollback {
            file_id,
            version_index,
        } => {
            ledger.rollback_file(&require_caller()?, file_id, version_index)?;
            print_json(&ledger.file_info(file_id)?)?;
        }
        Commands::Deactivate { file_id } => {
            ledger.deactivate_file(&require_caller()?, file_id)?;
            print_json(&json!({ "file_id": file_id, "is_active": false }))?;
        }
        Commands::Grant(cmd) => {
            let ctx = require_caller()?;
            match (cmd.read, cmd.write) {
                (true, true) => {
                    ledger.grant_read_write(&ctx, cmd.file_id, cmd.address, cmd.expires_at)?
                }
                (true, false) => ledger.grant_read(&ctx, cmd.file_id, cmd.address, cmd.expires_at)?,
                (false, true) => ledger.grant_write(&ctx, cmd.file_id, cmd.address, cmd.expires_at)?,
                (false, false) => bail!("grant needs --read, --write or both"),
            }
            print_json(&ledger.access_info(cmd.file_id, &cmd.address)?)?;
        }
        Commands::Revoke { file_id, address } => {
            ledger.revoke_access(&require_caller()?, file_id, address)?;
            print_json(&ledger.access_info(file_id, &address)?)?;
        }
        Commands::Info { file_id } => print_json(&ledger.file_info(file_id)?)?,
        Commands::Files { address } => print_json(&ledger.user_files(&address)?)?,
        Commands::Access { file_id, address } => {
            print_json(&ledger.access_info(file_id, &address)?)?
        }
        Commands::CanRead { file_id, address } => {
            print_json(&ledger.has_read_access(file_id, &address)?)?
        }
        Commands::CanWrite { file_id, address } => {
            print_json(&ledger.has_write_access(file_id, &address)?)?
        }
        Commands::Versions { file_id } => print_json(&ledger.file_versions(file_id)?)?,
        Commands::Users { file_id, active } => {
            let users = if active {
                ledger.active_grantees(file_id)?
            } else {
                ledger.users_with_access(file_id)?
            };
            print_json(&users)?
        }
        Commands::Hash { content_hash } => {
            let file_id = ledger.file_id_by_hash(&content_hash)?;
            print_json(&json!({ "content_hash": content_hash, "file_id": file_id }))?
        }
        Commands::Total => print_json(&json!({ "total_files": ledger.total_files()? }))?,
        Commands::Events { from, limit } => print_json(&ledger.events_since(from, limit)?)?,
        Commands::Snapshot { action } => match action {
            SnapshotCommands::Export { dir } => {
                let manifest = export_snapshot(ledger.store(), &dir)?;
                print_json(&manifest)?;
            }
            SnapshotCommands::Import { dir } => {
                let manifest = import_snapshot(ledger.store(), &dir)?;
                ledger.store().flush()?;
                info!(path = %dir.display(), "Snapshot imported");
                print_json(&manifest)?;
            }
        },
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_grant_with_flags() {
        let cli = Cli::try_parse_from([
            "fileledger",
            "--caller",
            "0x1111111111111111111111111111111111111111",
            "grant",
            "3",
            "0x2222222222222222222222222222222222222222",
            "--read",
            "--expires-at",
            "1700000000",
        ])
        .unwrap();
        assert_eq!(cli.caller, Some(Address([0x11; 20])));
        match cli.command {
            Commands::Grant(cmd) => {
                assert_eq!(cmd.file_id, FileId(3));
                assert_eq!(cmd.address, Address([0x22; 20]));
                assert!(cmd.read);
                assert!(!cmd.write);
                assert_eq!(cmd.expires_at, 1_700_000_000);
            }
            _ => panic!("expected grant"),
        }
    }

    #[test]
    fn grant_with_both_flags_is_one_event() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = FileLedger::new(SledLedgerStore::new(dir.path()).unwrap());
        let owner = "0x1111111111111111111111111111111111111111";
        let grantee = "0x2222222222222222222222222222222222222222";
        for args in [
            vec!["fileledger", "--caller", owner, "upload", "QmCli", "c.txt", "9", "bafyCli"],
            vec!["fileledger", "--caller", owner, "grant", "1", grantee, "--read", "--write"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            execute(&ledger, cli.caller, cli.command).unwrap();
        }

        let events = ledger.events_since(1, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event.name(), "access_granted");
        let info = ledger.access_info(FileId(1), &Address([0x22; 20])).unwrap();
        assert!(info.can_read && info.can_write);
    }

    #[test]
    fn rejects_malformed_address_and_id() {
        assert!(Cli::try_parse_from(["fileledger", "files", "0x1234"]).is_err());
        assert!(Cli::try_parse_from(["fileledger", "info", "0"]).is_err());
        assert!(Cli::try_parse_from(["fileledger", "info", "abc"]).is_err());
    }

    #[test]
    fn encrypted_upload_requires_key_hash_flag() {
        assert!(Cli::try_parse_from(["fileledger", "upload", "Qm", "f", "1", "bafy", "--encrypted"]).is_err());
        assert!(Cli::try_parse_from([
            "fileledger",
            "upload",
            "Qm",
            "f",
            "1",
            "bafy",
            "--encrypted",
            "--master-key-hash",
            "kh",
        ])
        .is_ok());
    }
}
