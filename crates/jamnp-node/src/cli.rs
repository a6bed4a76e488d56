//! Command-line surface (SPEC_FULL.md §3 "Configuration surface" / §6 "CLI / env").

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "jamnp-node", about = "JAM Simple Networking Protocol validator node")]
pub struct Args {
    /// Path to a TOML configuration file. Defaults are used for anything
    /// the file doesn't set; `JAMNP_*` environment variables win over both.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Validator index of this node within the genesis set passed to `Node::bootstrap`.
    #[arg(long, default_value_t = 0)]
    pub validator_index: u16,
}
