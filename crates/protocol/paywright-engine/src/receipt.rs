//! Audit receipts.
//!
//! Every payment decision maps to one immutable record with an AP2 stage
//! tag. Declines always name the specific limit that triggered them;
//! verification links are only attached when a transaction reference exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paywright_budget::BudgetConfig;
use paywright_keystore::BlobStore;
use paywright_x402::explorer_tx_url;

use crate::error::{EngineError, EngineResult};

/// Blob name receipts are appended under.
const RECEIPTS_BLOB: &str = "receipts.json";

/// Receipt lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStage {
    /// A resource was fetched; no payment was attempted.
    Intent,
    /// A payment settled (or was optimistically released).
    Settled,
    /// The budget gate refused the payment.
    Declined,
}

/// Snapshot of the authorization context at decision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationContext {
    /// Configured limits at the time of the decision.
    pub limits: BudgetConfig,
    /// Smallest units spent today before this request.
    pub spent_today: String,
    /// Smallest units spent lifetime before this request.
    pub spent_total: String,
    /// Smallest units this request asked for.
    pub requested: String,
}

/// Details of a completed settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    pub pay_to: String,
    pub amount: String,
    pub network: String,
}

/// Independent verification pointer for a settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub explorer_url: String,
}

/// Why a payment was declined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineRecord {
    /// The specific limit kind, never a generic "budget exceeded".
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    pub requested: String,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub ts: DateTime<Utc>,
    pub url: String,
    pub stage: ReceiptStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<AuthorizationContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline: Option<DeclineRecord>,
}

impl Receipt {
    /// A fetch that required no payment.
    pub fn intent(url: &str) -> Self {
        Self {
            ts: Utc::now(),
            url: url.to_string(),
            stage: ReceiptStage::Intent,
            context: None,
            settlement: None,
            verification: None,
            decline: None,
        }
    }

    /// A settled payment. The verification link is derived from the
    /// transaction reference and omitted when none exists.
    pub fn settled(
        url: &str,
        context: AuthorizationContext,
        settlement: SettlementRecord,
    ) -> Self {
        let verification = settlement
            .transaction
            .as_deref()
            .and_then(|tx| explorer_tx_url(&settlement.network, tx))
            .map(|explorer_url| VerificationRecord { explorer_url });
        Self {
            ts: Utc::now(),
            url: url.to_string(),
            stage: ReceiptStage::Settled,
            context: Some(context),
            settlement: Some(settlement),
            verification,
            decline: None,
        }
    }

    /// A declined payment with the specific limit that triggered it.
    pub fn declined(url: &str, context: AuthorizationContext, decline: DeclineRecord) -> Self {
        Self {
            ts: Utc::now(),
            url: url.to_string(),
            stage: ReceiptStage::Declined,
            context: Some(context),
            settlement: None,
            verification: None,
            decline: Some(decline),
        }
    }
}

/// Appends receipts to the audit log.
pub struct ReceiptRecorder {
    store: Arc<dyn BlobStore>,
}

impl ReceiptRecorder {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, receipt: Receipt) -> EngineResult<()> {
        let mut receipts = self.all()?;
        receipts.push(receipt);
        let bytes = serde_json::to_vec_pretty(&receipts)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .put(RECEIPTS_BLOB, &bytes)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(())
    }

    pub fn all(&self) -> EngineResult<Vec<Receipt>> {
        match self
            .store
            .get(RECEIPTS_BLOB)
            .map_err(|e| EngineError::Internal(e.to_string()))?
        {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| EngineError::Internal(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }
}
