//! Budget commands.

use paywright_budget::{
    format_units, BudgetConfig, BudgetStore, SpendingLedger, USDC_DECIMALS,
};

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::{BudgetOutput, OutputFormat, Render};

/// Execute `budget set`. Only the given limits change.
pub fn set(
    ctx: &CliContext,
    format: OutputFormat,
    per_request: Option<String>,
    daily: Option<String>,
    total: Option<String>,
) -> CliResult<String> {
    if per_request.is_none() && daily.is_none() && total.is_none() {
        return Err(CliError::user(
            "Nothing to set: pass --per-request, --daily, or --total.",
        ));
    }
    let store = BudgetStore::new(ctx.store.clone());
    let updated = store.update(BudgetConfig {
        per_request_max: per_request,
        daily_max: daily,
        total_max: total,
    })?;

    render_budget(ctx, format, updated)
}

/// Execute `budget show`.
pub fn show(ctx: &CliContext, format: OutputFormat) -> CliResult<String> {
    let config = BudgetStore::new(ctx.store.clone()).load()?;
    render_budget(ctx, format, config)
}

fn render_budget(ctx: &CliContext, format: OutputFormat, config: BudgetConfig) -> CliResult<String> {
    let totals = SpendingLedger::new(ctx.store.clone()).totals()?;
    let output = BudgetOutput {
        per_request_max: config.per_request_max,
        daily_max: config.daily_max,
        total_max: config.total_max,
        spent_today: format_units(totals.spent_today, USDC_DECIMALS),
        spent_total: format_units(totals.spent_total, USDC_DECIMALS),
    };
    Ok(output.render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliConfig;
    use tempfile::TempDir;

    fn context(temp_dir: &TempDir) -> CliContext {
        let mut config = CliConfig::default();
        config.storage.data_dir = temp_dir.path().to_path_buf();
        CliContext::open(config).unwrap()
    }

    #[test]
    fn test_set_then_show() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);

        let out = set(
            &ctx,
            OutputFormat::Json,
            None,
            Some("5.00".to_string()),
            None,
        )
        .unwrap();
        assert!(out.contains("\"daily_max\": \"5.00\""));

        let shown = show(&ctx, OutputFormat::Human).unwrap();
        assert!(shown.contains("5.00"));
    }

    #[test]
    fn test_set_nothing_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        assert!(set(&ctx, OutputFormat::Human, None, None, None).is_err());
    }

    #[test]
    fn test_set_rejects_bad_amount() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        let result = set(
            &ctx,
            OutputFormat::Human,
            Some("not-a-number".to_string()),
            None,
            None,
        );
        assert!(result.is_err());
    }
}
