//! Payment history command.

use paywright_budget::{format_units, parse_units, SpendingLedger, USDC_DECIMALS};

use crate::context::CliContext;
use crate::error::CliResult;
use crate::output::{mode_label, status_label, HistoryEntry, HistoryOutput, OutputFormat, Render};

/// Execute the history command.
pub fn history(ctx: &CliContext, format: OutputFormat, limit: usize) -> CliResult<String> {
    let ledger = SpendingLedger::new(ctx.store.clone());
    let totals = ledger.totals()?;

    let entries = ledger
        .entries()?
        .into_iter()
        .rev()
        .take(limit)
        .map(|e| {
            let amount = parse_units(&e.amount)
                .map(|units| format_units(units, USDC_DECIMALS))
                .unwrap_or_else(|_| e.amount.clone());
            HistoryEntry {
                ts: e.ts.to_rfc3339(),
                url: e.url,
                amount,
                network: e.network,
                mode: mode_label(e.mode).to_string(),
                status: status_label(e.status).to_string(),
                transaction: e.tx_hash,
                fail_reason: e.fail_reason,
            }
        })
        .collect();

    let output = HistoryOutput {
        entries,
        spent_today: format_units(totals.spent_today, USDC_DECIMALS),
        spent_total: format_units(totals.spent_total, USDC_DECIMALS),
    };
    Ok(output.render(format))
}
