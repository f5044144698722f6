// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use care_ledger_rs::gate::{DispatchGate, JsonFlags, MessageSender, OutboundMessage, ProviderReply};
use care_ledger_rs::{
    HistoryView, HttpSender, MemberId, MemoryStore, Reconciler, SendError, jobs,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use csv::Writer;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Care Ledger operations CLI
///
/// Runs the batch operations (reconciliation, cleanup, reminders, backup)
/// against a JSON snapshot of the ledger tables.
#[derive(Parser, Debug)]
#[command(name = "care-ledger-rs")]
#[command(about = "Operations CLI for the membership balance engine", long_about = None)]
struct Args {
    /// Path to a JSON snapshot of the ledger tables
    ///
    /// The same format the backup job writes.
    #[arg(long, value_name = "FILE")]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute every membership from its ledger rows and heal drifted snapshots
    Audit {
        /// Sweep worker threads
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Write the healed snapshot back to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Delete rows referencing members that no longer exist
    Cleanup {
        /// Write the cleaned snapshot back to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Send visit reminders for reservations on a date
    Remind {
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Feature-flag JSON file; everything enabled when omitted
        #[arg(long, value_name = "FILE")]
        flags: Option<PathBuf>,

        /// Provider relay endpoint; dry-run (log only) when omitted
        #[arg(long)]
        endpoint: Option<String>,

        /// API key for the provider relay
        #[arg(long, default_value = "")]
        api_key: String,
    },

    /// Re-serialize the snapshot to stdout
    Backup,

    /// Print one member's unified history as CSV
    Report {
        /// Member id
        member_id: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let store = match load_store(&args.data) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error loading snapshot '{}': {}", args.data.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = run(store, args.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(store: Arc<MemoryStore>, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Audit { workers, out } => {
            let report = Reconciler::with_workers(store.clone(), workers).audit_and_heal();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(path) = out {
                save_snapshot(&store, &path)?;
            }
        }
        Command::Cleanup { out } => {
            let report = Reconciler::new(store.clone()).purge_orphans();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(path) = out {
                save_snapshot(&store, &path)?;
            }
        }
        Command::Remind {
            date,
            flags,
            endpoint,
            api_key,
        } => {
            let flags = match flags {
                Some(path) => Arc::new(JsonFlags::from_json(&fs::read_to_string(path)?)?),
                None => Arc::new(JsonFlags::all_enabled()),
            };
            let sender: Arc<dyn MessageSender> = match endpoint {
                Some(endpoint) => Arc::new(HttpSender::new(endpoint, api_key)?),
                None => Arc::new(DryRunSender),
            };
            let gate = DispatchGate::new(flags, sender);
            let report = jobs::visit_reminders(store.as_ref(), &gate, date);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Backup => {
            jobs::backup(store.as_ref(), std::io::stdout().lock())?;
            println!();
        }
        Command::Report { member_id } => {
            let view = HistoryView::new(store);
            let entries = view.unified_history(MemberId(member_id))?;
            write_history_csv(&entries, std::io::stdout().lock())?;
        }
    }
    Ok(())
}

/// Sender used when no provider endpoint is configured: accepts everything
/// and logs what would have gone out.
struct DryRunSender;

impl MessageSender for DryRunSender {
    fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<ProviderReply, SendError> {
        info!(recipient, body = %message.body, "dry-run send");
        Ok(ProviderReply {
            code: 0,
            message: "dry-run".to_string(),
        })
    }
}

/// Loads a snapshot file into an in-memory store, failing loudly on any
/// unexpected shape.
fn load_store(path: &PathBuf) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)?;
    Ok(MemoryStore::from_snapshot_json(&json)?)
}

fn save_snapshot(store: &MemoryStore, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = fs::File::create(path)?;
    jobs::backup(store, &mut file)?;
    file.flush()?;
    Ok(())
}

/// Writes history entries as CSV with one row per entry, newest first.
fn write_history_csv<W: Write>(
    entries: &[care_ledger_rs::HistoryEntry],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for entry in entries {
        wtr.serialize(entry)?;
    }
    wtr.flush()?;
    Ok(())
}
