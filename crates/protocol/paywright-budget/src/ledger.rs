//! Append-only spending ledger with derived totals.
//!
//! Every signed payment is recorded before settlement is attempted, then
//! updated to settled or failed. Totals are recomputed from the full log on
//! each read so concurrent writers never leave a stale running counter.

use std::sync::Arc;

use alloy_primitives::U256;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use paywright_keystore::BlobStore;

use crate::amount::parse_units;
use crate::error::Result;

/// Blob name the ledger is persisted under.
const LEDGER_BLOB: &str = "ledger.json";

/// How a payment was delivered to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMode {
    /// Settled directly with the facilitator, then retried with a header.
    Http402,
    /// Settled directly with the facilitator for an inline-signalled page.
    Client,
    /// Payload posted to the resource's payment endpoint.
    Server,
}

/// Lifecycle of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Failed,
}

/// One recorded payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub ts: DateTime<Utc>,
    pub url: String,
    /// Amount in smallest units, as a decimal string.
    pub amount: String,
    pub asset: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub mode: PaymentMode,
    pub status: SettlementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

impl LedgerEntry {
    /// Amount in smallest units. Entries with a corrupt amount count as zero
    /// rather than poisoning every total.
    fn amount_units(&self) -> U256 {
        match parse_units(&self.amount) {
            Ok(units) => units,
            Err(err) => {
                warn!(amount = %self.amount, %err, "ignoring unparseable ledger amount");
                U256::ZERO
            }
        }
    }

    /// Whether this entry counts toward spend. Pending payments are held
    /// against the budget until their outcome is known; failed ones are not.
    fn counts_toward_spend(&self) -> bool {
        matches!(
            self.status,
            SettlementStatus::Pending | SettlementStatus::Settled
        )
    }
}

/// Spend aggregates derived from the full log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpendTotals {
    /// Units spent during the current UTC calendar day.
    pub spent_today: U256,
    /// Units spent over the ledger's lifetime.
    pub spent_total: U256,
}

/// The persisted payment log.
pub struct SpendingLedger {
    store: Arc<dyn BlobStore>,
}

impl SpendingLedger {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        match self.store.get(LEDGER_BLOB)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a new entry.
    pub fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.push(entry);
        self.save(&entries)
    }

    /// Resolve a pending entry identified by request id. Entries that are
    /// already settled or failed are left untouched, so replaying a sweep is
    /// harmless.
    pub fn update_status(
        &self,
        request_id: &str,
        status: SettlementStatus,
        tx_hash: Option<String>,
        fail_reason: Option<String>,
    ) -> Result<bool> {
        let mut entries = self.entries()?;
        let mut changed = false;
        for entry in entries.iter_mut() {
            if entry.request_id.as_deref() == Some(request_id)
                && entry.status == SettlementStatus::Pending
            {
                entry.status = status;
                entry.tx_hash = tx_hash.clone();
                entry.fail_reason = fail_reason.clone();
                changed = true;
            }
        }
        if changed {
            self.save(&entries)?;
        }
        Ok(changed)
    }

    /// Request ids of all pending entries.
    pub fn pending_request_ids(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|e| e.status == SettlementStatus::Pending)
            .filter_map(|e| e.request_id.clone().map(|id| (id, e.ts)))
            .collect())
    }

    /// Recompute totals from the full log at the given instant.
    pub fn totals_at(&self, now: DateTime<Utc>) -> Result<SpendTotals> {
        let mut totals = SpendTotals::default();
        for entry in self.entries()? {
            if !entry.counts_toward_spend() {
                continue;
            }
            let units = entry.amount_units();
            totals.spent_total = totals.spent_total.saturating_add(units);
            if same_utc_day(entry.ts, now) {
                totals.spent_today = totals.spent_today.saturating_add(units);
            }
        }
        Ok(totals)
    }

    /// Recompute totals as of now.
    pub fn totals(&self) -> Result<SpendTotals> {
        self.totals_at(Utc::now())
    }

    fn save(&self, entries: &[LedgerEntry]) -> Result<()> {
        self.store
            .put(LEDGER_BLOB, &serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}

fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}
