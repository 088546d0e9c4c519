//! The budget gate.
//!
//! A pure decision over the offered price, the caller's explicit limit, the
//! configured caps, and the current spend totals. No clock or store access
//! happens here; callers snapshot totals under the advisory lock and pass
//! them in.

use alloy_primitives::U256;

use crate::config::BudgetConfig;
use crate::error::Result;
use crate::ledger::SpendTotals;

/// Why a payment was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    /// No explicit per-call limit and no budget configured at all.
    NoBudget,
    /// Price exceeds the caller's explicit limit.
    MaxPrice,
    /// Price exceeds the configured per-request cap.
    PerRequest,
    /// Payment would push today's spend over the daily cap.
    Daily,
    /// Payment would push lifetime spend over the total cap.
    Total,
}

impl DeclineReason {
    /// Stable machine-readable code for receipts and exit statuses.
    pub fn code(&self) -> &'static str {
        match self {
            DeclineReason::NoBudget => "no_budget",
            DeclineReason::MaxPrice => "max_price_exceeded",
            DeclineReason::PerRequest => "per_request_exceeded",
            DeclineReason::Daily => "daily_exceeded",
            DeclineReason::Total => "total_exceeded",
        }
    }
}

/// Outcome of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    Allowed,
    Declined(DeclineReason),
}

impl BudgetVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BudgetVerdict::Allowed)
    }
}

/// Decide whether a payment of `price` smallest units may proceed.
///
/// Checks run in a fixed order and the first failing one wins: an explicit
/// authorization must exist, then the caller's limit, then per-request,
/// daily, and lifetime caps.
pub fn check_budget(
    price: U256,
    max_price: Option<U256>,
    config: &BudgetConfig,
    totals: &SpendTotals,
) -> Result<BudgetVerdict> {
    if max_price.is_none() && !config.is_configured() {
        return Ok(BudgetVerdict::Declined(DeclineReason::NoBudget));
    }

    if let Some(limit) = max_price {
        if price > limit {
            return Ok(BudgetVerdict::Declined(DeclineReason::MaxPrice));
        }
    }

    if let Some(cap) = config.per_request_units()? {
        if price > cap {
            return Ok(BudgetVerdict::Declined(DeclineReason::PerRequest));
        }
    }

    if let Some(cap) = config.daily_units()? {
        if totals.spent_today.saturating_add(price) > cap {
            return Ok(BudgetVerdict::Declined(DeclineReason::Daily));
        }
    }

    if let Some(cap) = config.total_units()? {
        if totals.spent_total.saturating_add(price) > cap {
            return Ok(BudgetVerdict::Declined(DeclineReason::Total));
        }
    }

    Ok(BudgetVerdict::Allowed)
}
