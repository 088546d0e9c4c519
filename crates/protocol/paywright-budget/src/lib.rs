//! Spending ledger and budget gate.
//!
//! All currency amounts flow through this crate as integers in the asset's
//! smallest unit ([`alloy_primitives::U256`]); decimal strings exist only at
//! the boundary (config parsing and display). Totals are always recomputed
//! from the full ledger, never carried as running counters, and "today" is
//! the UTC calendar date.
//!
//! The gate itself ([`check_budget`]) is a pure function. The check-then-
//! spend sequence it belongs to is made atomic across processes by the
//! [`AdvisoryLock`] the orchestrator wraps around it.

pub mod amount;
pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod lock;

pub use amount::{format_units, parse_decimal, parse_units, USDC_DECIMALS};
pub use config::{BudgetConfig, BudgetStore};
pub use error::{BudgetError, Result};
pub use gate::{check_budget, BudgetVerdict, DeclineReason};
pub use ledger::{LedgerEntry, PaymentMode, SettlementStatus, SpendTotals, SpendingLedger};
pub use lock::{AdvisoryLock, LockGuard};

/// Lock name guarding the budget check-then-spend sequence.
pub const BUDGET_LOCK: &str = "budget";
