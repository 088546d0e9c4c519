//! Paywright CLI entry point.

mod cli;
mod commands;
mod config;
mod context;
mod error;
mod output;
mod prompt;
mod signals;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::cli::{BudgetCommands, Cli, Commands, WalletCommands};
use crate::commands::fetch::FetchArgs;
use crate::config::CliConfig;
use crate::context::CliContext;
use crate::error::CliResult;
use crate::output::OutputFormat;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(out) => {
            if !out.is_empty() {
                println!("{out}");
            }
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "paywright=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult<String> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::load_default()?,
    };
    let ctx = CliContext::open(config)?;
    let format: OutputFormat = cli.format.into();

    match cli.command {
        Commands::Wallet { command } => match command {
            WalletCommands::Create {
                network,
                encryption,
            } => commands::wallet::create(&ctx, format, &network, encryption.into()),
            WalletCommands::Import {
                network,
                encryption,
                key,
            } => commands::wallet::import(&ctx, format, &network, encryption.into(), key.as_deref()),
            WalletCommands::Show => commands::wallet::show(&ctx, format),
            WalletCommands::Migrate { encryption } => {
                commands::wallet::migrate(&ctx, format, encryption.into()).await
            }
            WalletCommands::Delete { force } => {
                commands::wallet::delete(&ctx, format, force).await
            }
        },
        Commands::Budget { command } => match command {
            BudgetCommands::Set {
                per_request,
                daily,
                total,
            } => commands::budget::set(&ctx, format, per_request, daily, total),
            BudgetCommands::Show => commands::budget::show(&ctx, format),
        },
        Commands::Fetch {
            url,
            max_price,
            network,
            timeout_ms,
            optimistic,
        } => {
            let shutdown = signals::shutdown_signal(ctx.wallet.clone());
            commands::fetch::fetch(
                &ctx,
                format,
                FetchArgs {
                    url,
                    max_price,
                    network,
                    timeout_ms,
                    optimistic,
                },
                shutdown,
            )
            .await
        }
        Commands::History { limit } => commands::history::history(&ctx, format, limit),
    }
}
