//! Pending-settlement markers and restart recovery.
//!
//! Optimistic settlement persists a marker before the caller gets its
//! provisional result. If the process dies mid-settlement the outcome is
//! unknown; the startup sweep resolves every leftover marker to failed
//! rather than retrying, since a blind retry could double-pay.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use paywright_budget::{AdvisoryLock, SettlementStatus, SpendingLedger};
use paywright_keystore::BlobStore;
use paywright_x402::{PaymentPayload, AUTHORIZATION_VALIDITY_SECONDS};

use crate::error::{EngineError, EngineResult};

/// Blob name the markers are persisted under.
const PENDING_BLOB: &str = "pending.json";

/// Cross-restart marker for an in-flight optimistic settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSettlement {
    pub request_id: String,
    /// The calling context (tab, session) that is waiting, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub url: String,
    /// Amount in smallest units.
    pub amount: String,
    pub network: String,
    pub payload: PaymentPayload,
    pub signed_at: DateTime<Utc>,
}

/// Terminal outcome of a settlement, published to waiting callers.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub request_id: String,
    pub status: SettlementStatus,
    pub transaction: Option<String>,
    pub reason: Option<String>,
}

/// Broadcast channel for settlement outcomes so optimistic callers never
/// hang on a settlement that died with a previous process.
#[derive(Clone)]
pub struct SettlementNotifier {
    sender: broadcast::Sender<SettlementOutcome>,
}

impl SettlementNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettlementOutcome> {
        self.sender.subscribe()
    }

    /// Publish an outcome. No subscribers is fine.
    pub fn notify(&self, outcome: SettlementOutcome) {
        let _ = self.sender.send(outcome);
    }
}

impl Default for SettlementNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted set of pending markers.
pub struct PendingStore {
    store: Arc<dyn BlobStore>,
}

impl PendingStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> EngineResult<Vec<PendingSettlement>> {
        match self
            .store
            .get(PENDING_BLOB)
            .map_err(|e| EngineError::Internal(e.to_string()))?
        {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| EngineError::Internal(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn add(&self, marker: PendingSettlement) -> EngineResult<()> {
        let mut markers = self.list()?;
        markers.push(marker);
        self.save(&markers)
    }

    /// Remove a marker by request id. Returns whether one was removed, so a
    /// completion and a recovery sweep racing on the same id resolve it once.
    pub fn remove(&self, request_id: &str) -> EngineResult<bool> {
        let mut markers = self.list()?;
        let before = markers.len();
        markers.retain(|m| m.request_id != request_id);
        if markers.len() == before {
            return Ok(false);
        }
        self.save(&markers)?;
        Ok(true)
    }

    fn save(&self, markers: &[PendingSettlement]) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(markers)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .put(PENDING_BLOB, &bytes)
            .map_err(|e| EngineError::Internal(e.to_string()))
    }
}

/// Startup reconciliation sweep.
///
/// Any marker found belongs to a process that died with settlement in
/// flight. Its outcome is unknown, so it resolves to failed: reason
/// `timeout` when the signature validity window has passed, `interrupted`
/// otherwise. Running the sweep twice produces one ledger update per
/// request id.
///
/// The whole sweep runs under the budget advisory lock: its ledger rewrites
/// share the files every gate and settlement writer touches.
pub async fn recover_pending(
    pending: &PendingStore,
    ledger: &SpendingLedger,
    notifier: &SettlementNotifier,
    lock: &AdvisoryLock,
) -> EngineResult<usize> {
    let _guard = lock.acquire().await?;
    let markers = pending.list()?;
    let now = Utc::now();
    let mut recovered = 0;

    for marker in markers {
        let reason = orphan_reason(marker.signed_at, now);
        let updated = ledger.update_status(
            &marker.request_id,
            SettlementStatus::Failed,
            None,
            Some(reason.to_string()),
        )?;
        let removed = pending.remove(&marker.request_id)?;
        if updated || removed {
            warn!(
                request_id = %marker.request_id,
                url = %marker.url,
                reason,
                "resolved orphaned pending settlement"
            );
            notifier.notify(SettlementOutcome {
                request_id: marker.request_id,
                status: SettlementStatus::Failed,
                transaction: None,
                reason: Some(reason.to_string()),
            });
            recovered += 1;
        }
    }

    // A crash between the ledger append and the marker write leaves a
    // pending entry with no marker. It would count toward spend forever,
    // so the sweep resolves it the same way.
    for (request_id, ts) in ledger.pending_request_ids()? {
        let reason = orphan_reason(ts, now);
        if ledger.update_status(
            &request_id,
            SettlementStatus::Failed,
            None,
            Some(reason.to_string()),
        )? {
            warn!(
                request_id = %request_id,
                reason,
                "resolved markerless pending ledger entry"
            );
            notifier.notify(SettlementOutcome {
                request_id,
                status: SettlementStatus::Failed,
                transaction: None,
                reason: Some(reason.to_string()),
            });
            recovered += 1;
        }
    }

    if recovered > 0 {
        info!(recovered, "pending settlement recovery complete");
    }
    Ok(recovered)
}

fn orphan_reason(signed_at: DateTime<Utc>, now: DateTime<Utc>) -> &'static str {
    let elapsed = now.signed_duration_since(signed_at).num_seconds().max(0) as u64;
    if elapsed > AUTHORIZATION_VALIDITY_SECONDS {
        "timeout"
    } else {
        "interrupted"
    }
}
