//! Command output rendering.
//!
//! Every command builds a serializable output struct and renders it either
//! as colored human-readable text or as JSON for scripting.

use colored::Colorize;
use serde::Serialize;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render an output struct in the selected format.
pub trait Render: Serialize {
    /// Human-readable rendering.
    fn human(&self) -> String;

    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.human(),
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
            }
        }
    }
}

/// Wallet details.
#[derive(Debug, Serialize)]
pub struct WalletOutput {
    pub address: String,
    pub network: String,
    pub encryption: String,
}

impl Render for WalletOutput {
    fn human(&self) -> String {
        format!(
            "{}\n  Address:    {}\n  Network:    {}\n  Encryption: {}",
            "Wallet".bold(),
            self.address.cyan(),
            self.network,
            self.encryption,
        )
    }
}

/// Budget limits and current spend.
#[derive(Debug, Serialize)]
pub struct BudgetOutput {
    pub per_request_max: Option<String>,
    pub daily_max: Option<String>,
    pub total_max: Option<String>,
    /// Spent in the current UTC day, in USDC.
    pub spent_today: String,
    /// Spent lifetime, in USDC.
    pub spent_total: String,
}

impl Render for BudgetOutput {
    fn human(&self) -> String {
        let limit = |v: &Option<String>| match v {
            Some(v) => format!("{v} USDC"),
            None => "unset".dimmed().to_string(),
        };
        format!(
            "{}\n  Per request: {}\n  Daily:       {}\n  Total:       {}\n{}\n  Today:       {} USDC\n  Lifetime:    {} USDC",
            "Limits".bold(),
            limit(&self.per_request_max),
            limit(&self.daily_max),
            limit(&self.total_max),
            "Spent".bold(),
            self.spent_today,
            self.spent_total,
        )
    }
}

/// What a fetch paid, shown alongside the content.
#[derive(Debug, Serialize)]
pub struct PaymentOutput {
    pub request_id: String,
    /// Amount in USDC (decimal).
    pub amount: String,
    pub network: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub settled: bool,
}

impl Render for PaymentOutput {
    fn human(&self) -> String {
        let status = if self.settled {
            "settled".green().to_string()
        } else {
            "pending".yellow().to_string()
        };
        let mut out = format!(
            "{} {} USDC on {} ({}, {})",
            "Paid".bold(),
            self.amount,
            self.network,
            self.mode,
            status,
        );
        if let Some(url) = &self.explorer_url {
            out.push_str(&format!("\n  {}", url.dimmed()));
        }
        out
    }
}

/// Full fetch result, for JSON mode.
#[derive(Debug, Serialize)]
pub struct FetchOutput {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentOutput>,
}

impl Render for FetchOutput {
    fn human(&self) -> String {
        // Human mode prints content bare; the payment line goes to stderr.
        self.content.clone()
    }
}

/// One payment history line.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub ts: String,
    pub url: String,
    /// Amount in USDC (decimal).
    pub amount: String,
    pub network: String,
    pub mode: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

/// Payment history.
#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub entries: Vec<HistoryEntry>,
    /// Spent in the current UTC day, in USDC.
    pub spent_today: String,
    /// Spent lifetime, in USDC.
    pub spent_total: String,
}

impl Render for HistoryOutput {
    fn human(&self) -> String {
        if self.entries.is_empty() {
            return "No payments yet.".dimmed().to_string();
        }
        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        for e in &self.entries {
            let status = match e.status.as_str() {
                "settled" => e.status.green().to_string(),
                "failed" => e.status.red().to_string(),
                _ => e.status.yellow().to_string(),
            };
            let mut line = format!(
                "{}  {:>10} USDC  {}  {}  {}",
                e.ts, e.amount, e.mode, status, e.url
            );
            if let Some(reason) = &e.fail_reason {
                line.push_str(&format!("  ({reason})"));
            }
            lines.push(line);
        }
        lines.push(format!(
            "\n{} today: {} USDC, lifetime: {} USDC",
            "Spent".bold(),
            self.spent_today,
            self.spent_total
        ));
        lines.join("\n")
    }
}

/// Stable label for a payment mode, matching the ledger's wire form.
pub fn mode_label(mode: paywright_budget::PaymentMode) -> &'static str {
    match mode {
        paywright_budget::PaymentMode::Http402 => "http402",
        paywright_budget::PaymentMode::Client => "client",
        paywright_budget::PaymentMode::Server => "server",
    }
}

/// Stable label for a settlement status.
pub fn status_label(status: paywright_budget::SettlementStatus) -> &'static str {
    match status {
        paywright_budget::SettlementStatus::Pending => "pending",
        paywright_budget::SettlementStatus::Settled => "settled",
        paywright_budget::SettlementStatus::Failed => "failed",
    }
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageOutput {
    pub message: String,
}

impl Render for MessageOutput {
    fn human(&self) -> String {
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_output_renders_both_formats() {
        let output = WalletOutput {
            address: "0xabc".to_string(),
            network: "eip155:8453".to_string(),
            encryption: "machine".to_string(),
        };
        assert!(output.render(OutputFormat::Human).contains("0xabc"));
        let json = output.render(OutputFormat::Json);
        assert!(json.contains("\"address\""));
    }

    #[test]
    fn test_history_empty() {
        let output = HistoryOutput {
            entries: vec![],
            spent_today: "0".to_string(),
            spent_total: "0".to_string(),
        };
        assert!(output.human().contains("No payments"));
    }

    #[test]
    fn test_payment_output_pending() {
        let output = PaymentOutput {
            request_id: "pay-0011223344556677".to_string(),
            amount: "0.01".to_string(),
            network: "eip155:8453".to_string(),
            mode: "client".to_string(),
            transaction: None,
            explorer_url: None,
            settled: false,
        };
        assert!(output.human().contains("pending"));
    }
}
