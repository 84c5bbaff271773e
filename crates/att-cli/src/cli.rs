//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Attendance state engine.
///
/// Tracks who is in which room by processing time-in/time-out scans
/// against scheduled sessions.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process one scan against a session.
    Scan {
        /// Identity presenting the scan.
        #[arg(long)]
        identity: String,

        /// Session the scan is aimed at. The room is taken from the session.
        #[arg(long)]
        session: String,

        /// Scan timestamp (wall clock, e.g. 2025-03-10T08:00:00).
        /// Defaults to now.
        #[arg(long)]
        at: Option<String>,

        /// Output the decision as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage identities.
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Manage rooms.
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Manage sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List currently active attendance records.
    Active {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Force-close orphaned records older than the configured age.
    Reap,

    /// Report a session's attendance records.
    Report {
        /// Session to report on.
        #[arg(long)]
        session: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show occupancy summary.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum IdentityAction {
    /// Register an identity.
    Add {
        /// Stable identifier (badge id, student id).
        #[arg(long)]
        id: String,

        /// Display name.
        #[arg(long)]
        name: String,
    },
    /// List identities.
    List,
}

#[derive(Debug, Subcommand)]
pub enum RoomAction {
    /// Register a room.
    Add {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,
    },
    /// List rooms.
    List,
}

#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// Schedule a session.
    Add {
        /// Session identifier. Generated when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Room the session is bound to.
        #[arg(long)]
        room: String,

        /// Display name.
        #[arg(long)]
        name: Option<String>,

        /// Scheduled start (e.g. 2025-03-10T08:00:00).
        #[arg(long)]
        starts: String,

        /// Scheduled end.
        #[arg(long)]
        ends: String,

        /// Grace minutes before start during which scans are accepted.
        #[arg(long)]
        grace_in: Option<i64>,

        /// Grace minutes after end during which scans are accepted.
        #[arg(long)]
        grace_out: Option<i64>,
    },
    /// List sessions.
    List,
}
