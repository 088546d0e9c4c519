//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Paywright CLI.
#[derive(Parser, Debug)]
#[command(name = "paywright")]
#[command(version)]
#[command(about = "Pay-per-fetch client for x402 micropayments")]
#[command(
    long_about = "Paywright fetches web resources and pays for them with signed USDC\ntransfer authorizations when a page demands payment.\n\nRun 'paywright wallet create' to get started."
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (human or json).
    #[arg(short, long, global = true, default_value = "human")]
    pub format: OutputFormatArg,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormatArg {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the payment wallet.
    Wallet {
        #[command(subcommand)]
        command: WalletCommands,
    },

    /// Manage spending limits.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },

    /// Fetch a URL, paying for it if it asks.
    ///
    /// Prints the resource content on stdout. Payment details go to stderr
    /// in human mode; in JSON mode everything is one object on stdout.
    Fetch {
        /// URL to fetch.
        url: String,

        /// Per-call spending limit in USDC (e.g. "0.05").
        #[arg(short, long)]
        max_price: Option<String>,

        /// Only pay on this network (CAIP-2 id or alias, e.g. "base").
        #[arg(short, long)]
        network: Option<String>,

        /// Request timeout in milliseconds.
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Release content immediately and settle in the background.
        #[arg(short, long)]
        optimistic: bool,
    },

    /// Show the payment history.
    History {
        /// Maximum entries to show, newest first.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Wallet subcommands.
#[derive(Subcommand, Debug)]
pub enum WalletCommands {
    /// Generate a new wallet.
    Create {
        /// Network the wallet pays on (CAIP-2 id or alias).
        #[arg(short, long, default_value = "base")]
        network: String,

        /// Encryption backend for the private key.
        #[arg(short, long, default_value = "machine")]
        encryption: EncryptionArg,
    },

    /// Import an existing private key.
    ///
    /// The key is prompted for interactively (hidden input) unless --key
    /// is given; passing it on the command line leaks it to the shell
    /// history.
    Import {
        /// Network the wallet pays on (CAIP-2 id or alias).
        #[arg(short, long, default_value = "base")]
        network: String,

        /// Encryption backend for the private key.
        #[arg(short, long, default_value = "machine")]
        encryption: EncryptionArg,

        /// 64-char hex private key (prompted if omitted).
        #[arg(long)]
        key: Option<String>,
    },

    /// Show the wallet address and encryption backend.
    Show,

    /// Re-encrypt the wallet under a different backend.
    Migrate {
        /// New encryption backend.
        encryption: EncryptionArg,
    },

    /// Delete the wallet.
    Delete {
        /// Skip confirmation prompt.
        #[arg(short = 'F', long)]
        force: bool,
    },
}

/// Budget subcommands.
#[derive(Subcommand, Debug)]
pub enum BudgetCommands {
    /// Set spending limits. Only the given limits change.
    Set {
        /// Maximum per single payment, in USDC.
        #[arg(long)]
        per_request: Option<String>,

        /// Maximum per UTC calendar day, in USDC.
        #[arg(long)]
        daily: Option<String>,

        /// Lifetime maximum, in USDC.
        #[arg(long)]
        total: Option<String>,
    },

    /// Show limits and current spend.
    Show,
}

/// Encryption backend argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncryptionArg {
    /// Key derived from machine identity; no prompting.
    Machine,
    /// Key derived from a password.
    Password,
    /// Key material from the process environment.
    Env,
}

impl From<EncryptionArg> for paywright_keystore::EncryptionMode {
    fn from(arg: EncryptionArg) -> Self {
        match arg {
            EncryptionArg::Machine => paywright_keystore::EncryptionMode::Machine,
            EncryptionArg::Password => paywright_keystore::EncryptionMode::Password,
            EncryptionArg::Env => paywright_keystore::EncryptionMode::Env,
        }
    }
}
