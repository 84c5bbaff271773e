//! CLI subcommand implementations.

pub mod active;
pub mod identity;
pub mod reap;
pub mod report;
pub mod room;
pub mod scan;
pub mod session;
pub mod status;
pub mod util;
