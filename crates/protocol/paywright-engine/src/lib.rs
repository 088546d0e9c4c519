//! The paywright payment engine.
//!
//! Given a URL, the engine fetches it, detects whether (and how) the page
//! demands payment, enforces the configured budget under a cross-process
//! lock, signs a time-bounded transfer authorization, settles it, and
//! records an auditable receipt. Settlement can block until confirmed or run
//! optimistically in the background with crash recovery at next startup.
//!
//! # Components
//!
//! - **[`engine`]**: [`PaymentEngine::fetch_with_payment`], the protocol
//!   state machine
//! - **[`fetch`]**: the [`Fetcher`] seam and the reqwest default
//! - **[`pending`]**: pending-settlement markers, the startup recovery
//!   sweep, and the outcome notifier
//! - **[`receipt`]**: AP2-stage audit receipts
//! - **[`error`]**: the machine-readable error taxonomy

pub mod engine;
pub mod error;
pub mod fetch;
pub mod pending;
pub mod receipt;

pub use engine::{FetchOptions, FetchSuccess, PaymentEngine, PaymentInfo};
pub use error::{EngineError, EngineResult};
pub use fetch::{FetchedResponse, Fetcher, HttpFetcher};
pub use pending::{
    recover_pending, PendingSettlement, PendingStore, SettlementNotifier, SettlementOutcome,
};
pub use receipt::{
    AuthorizationContext, DeclineRecord, Receipt, ReceiptRecorder, ReceiptStage,
    SettlementRecord, VerificationRecord,
};
