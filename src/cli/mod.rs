pub mod commands;
pub mod context;
pub mod output;
pub mod progress;

use clap::{Parser, Subcommand};

/// Decrypt and verify OpenPGP messages without knowing the key up front.
#[derive(Parser, Debug)]
#[command(name = "unveil", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to alternative config file
    #[arg(long, global = true, env = "UNVEIL_CONFIG")]
    pub config: Option<String>,

    /// Path to the gpg binary (overrides the config file)
    #[arg(long, global = true)]
    pub gpg: Option<String>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Where the payload comes from. At most one source may be given.
#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// Encrypted or signed file
    #[arg(conflicts_with_all = ["text", "stdin"])]
    pub file: Option<String>,

    /// Message text (e.g. a pasted mail body containing an armored block)
    #[arg(long, conflicts_with = "stdin")]
    pub text: Option<String>,

    /// Read the payload from standard input
    #[arg(long)]
    pub stdin: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decrypt and/or verify a payload
    Decrypt {
        #[command(flatten)]
        input: InputArgs,

        /// Where to write a decrypted file (file input only)
        #[arg(short, long)]
        output: Option<String>,

        /// Print message plaintext as raw bytes instead of text
        #[arg(long)]
        binary: bool,

        /// Never offer to fetch an unknown signer's key
        #[arg(long)]
        no_lookup: bool,

        /// Delete the encrypted input file after a successful decryption
        #[arg(long)]
        delete_after: bool,

        /// Answer yes to confirmations
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show what a payload needs without decrypting it
    Probe {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Show decryption history
    Log {
        /// Filter entries since this date (ISO 8601)
        #[arg(long)]
        since: Option<String>,
        /// Show only the last N entries
        #[arg(long)]
        last: Option<usize>,
    },
}
