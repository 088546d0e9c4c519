//! The fetch command: retrieve a URL, paying for it if it asks.

use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;

use paywright_budget::{format_units, parse_units, USDC_DECIMALS};
use paywright_engine::{FetchOptions, PaymentInfo};
use paywright_keystore::EncryptionMode;
use paywright_x402::explorer_tx_url;

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::{mode_label, FetchOutput, OutputFormat, PaymentOutput, Render};
use crate::prompt;

/// How long to wait for an optimistic settlement before exiting anyway.
const OPTIMISTIC_WAIT: Duration = Duration::from_secs(120);

/// Per-fetch flags, merged over config defaults.
pub struct FetchArgs {
    pub url: String,
    pub max_price: Option<String>,
    pub network: Option<String>,
    pub timeout_ms: Option<u64>,
    pub optimistic: bool,
}

/// Execute the fetch command.
pub async fn fetch(
    ctx: &CliContext,
    format: OutputFormat,
    args: FetchArgs,
    mut shutdown: watch::Receiver<bool>,
) -> CliResult<String> {
    let engine = ctx.engine().await?;

    // Password-encrypted wallets need the password before the gate runs.
    let password = match ctx.wallet.load_record() {
        Ok(record) if record.mode() == EncryptionMode::Password => Some(
            prompt::get_wallet_password(&ctx.prompts, &record.address)?,
        ),
        _ => None,
    };

    let opts = FetchOptions {
        max_price: args
            .max_price
            .or_else(|| ctx.config.payment.default_max_price.clone()),
        network: args
            .network
            .or_else(|| ctx.config.payment.default_network.clone()),
        timeout_ms: args.timeout_ms.or(ctx.config.payment.timeout_ms),
        optimistic: args.optimistic,
        context: None,
        password,
    };

    let mut outcomes = engine.notifier().subscribe();
    let result = tokio::select! {
        result = engine.fetch_with_payment(&args.url, opts) => result?,
        _ = shutdown.changed() => {
            return Err(CliError::user("Interrupted."));
        }
    };

    let mut payment = result.payment.clone().map(payment_output);

    // In optimistic mode the content is already in hand; wait for the
    // background settlement so the process exit reflects its outcome.
    if let Some(info) = result.payment.as_ref().filter(|p| !p.settled) {
        if format == OutputFormat::Human {
            eprintln!("{}", "Settling in the background...".dimmed());
        }
        let confirmed =
            tokio::time::timeout(OPTIMISTIC_WAIT, wait_for_outcome(&mut outcomes, &info.request_id))
                .await
                .ok()
                .flatten();
        if let (Some(outcome), Some(out)) = (confirmed, payment.as_mut()) {
            out.settled = outcome.status == paywright_budget::SettlementStatus::Settled;
            out.transaction = outcome.transaction.clone();
            out.explorer_url = outcome
                .transaction
                .as_deref()
                .and_then(|tx| explorer_tx_url(&out.network, tx));
            if !out.settled {
                let reason = outcome.reason.unwrap_or_else(|| "unknown".to_string());
                return Err(CliError::user(format!("Settlement failed: {reason}")));
            }
        }
    }

    if format == OutputFormat::Human {
        if let Some(out) = &payment {
            eprintln!("{}", out.human());
        }
        // Content goes to stdout bare, pipeable.
        return Ok(result.content);
    }

    let output = FetchOutput {
        status_code: result.status_code,
        content_type: result.content_type,
        content: result.content,
        payment,
    };
    Ok(output.render(format))
}

async fn wait_for_outcome(
    outcomes: &mut tokio::sync::broadcast::Receiver<paywright_engine::SettlementOutcome>,
    request_id: &str,
) -> Option<paywright_engine::SettlementOutcome> {
    while let Ok(outcome) = outcomes.recv().await {
        if outcome.request_id == request_id {
            return Some(outcome);
        }
    }
    None
}

fn payment_output(info: PaymentInfo) -> PaymentOutput {
    let amount = parse_units(&info.amount)
        .map(|units| format_units(units, USDC_DECIMALS))
        .unwrap_or_else(|_| info.amount.clone());
    let explorer_url = info
        .transaction
        .as_deref()
        .and_then(|tx| explorer_tx_url(&info.network, tx));
    PaymentOutput {
        request_id: info.request_id,
        amount,
        network: info.network,
        mode: mode_label(info.mode).to_string(),
        transaction: info.transaction,
        explorer_url,
        settled: info.settled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paywright_budget::PaymentMode;

    #[test]
    fn test_payment_output_formats_amount() {
        let info = PaymentInfo {
            request_id: "pay-0011223344556677".to_string(),
            amount: "10000".to_string(),
            network: "eip155:8453".to_string(),
            mode: PaymentMode::Client,
            transaction: Some("0xabc".to_string()),
            settled: true,
        };
        let out = payment_output(info);
        assert_eq!(out.amount, "0.01");
        assert_eq!(out.mode, "client");
        assert!(out.explorer_url.as_deref().unwrap().contains("basescan.org"));
    }
}
