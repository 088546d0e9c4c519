//! The settlement orchestrator.
//!
//! Sequences detection, the budget gate, signing, and settlement for one
//! fetched resource. Dispatch order on a response: 402 header path, then
//! no-payment passthrough, then inline client mode, then inline server mode.
//! The budget gate always runs under the cross-process advisory lock before
//! any signing happens.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use rand::RngCore;
use serde_json::json;
use tracing::{debug, info, warn};

use paywright_budget::{
    check_budget, format_units, parse_decimal, parse_units, AdvisoryLock, BudgetConfig,
    BudgetStore, BudgetVerdict, DeclineReason, LedgerEntry, LockGuard, PaymentMode,
    SettlementStatus, SpendingLedger, BUDGET_LOCK, USDC_DECIMALS,
};
use paywright_keystore::{BlobStore, WalletManager};
use paywright_x402::{
    chain_for, sign_authorization, validate_asset, validate_outbound_url, Detection, Facilitator,
    OfferMode, PaymentOffer, PaymentPayload, SettleResponse, SignalDetector, HEADER_PAYMENT,
};

use crate::error::{EngineError, EngineResult};
use crate::fetch::{FetchedResponse, Fetcher};
use crate::pending::{
    recover_pending, PendingSettlement, PendingStore, SettlementNotifier, SettlementOutcome,
};
use crate::receipt::{
    AuthorizationContext, DeclineRecord, Receipt, ReceiptRecorder, SettlementRecord,
};

/// Default fetch timeout when the caller sets none.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Options for a single `fetch_with_payment` call.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Per-call spending limit, human decimal string ("0.05").
    pub max_price: Option<String>,
    /// Restrict payment to this network.
    pub network: Option<String>,
    /// Fetch timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Release content after signing, settle in the background.
    pub optimistic: bool,
    /// Calling-context handle for duplicate-payment rejection.
    pub context: Option<String>,
    /// Password for the password encryption backend.
    pub password: Option<String>,
}

/// What was paid, attached to a successful fetch.
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub request_id: String,
    /// Amount in smallest units.
    pub amount: String,
    pub network: String,
    pub mode: PaymentMode,
    pub transaction: Option<String>,
    /// False while an optimistic settlement is still in flight.
    pub settled: bool,
}

/// Successful result of `fetch_with_payment`.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content: String,
    pub payment: Option<PaymentInfo>,
}

/// The payment engine.
pub struct PaymentEngine {
    fetcher: Arc<dyn Fetcher>,
    facilitator: Arc<dyn Facilitator>,
    detector: Arc<dyn SignalDetector>,
    wallet: Arc<WalletManager>,
    budget: BudgetStore,
    ledger: Arc<SpendingLedger>,
    pending: Arc<PendingStore>,
    receipts: Arc<ReceiptRecorder>,
    lock: AdvisoryLock,
    notifier: SettlementNotifier,
    in_flight: Arc<StdMutex<HashSet<String>>>,
}

impl PaymentEngine {
    pub fn new(
        data_dir: &Path,
        store: Arc<dyn BlobStore>,
        wallet: Arc<WalletManager>,
        fetcher: Arc<dyn Fetcher>,
        facilitator: Arc<dyn Facilitator>,
        detector: Arc<dyn SignalDetector>,
    ) -> Self {
        Self {
            fetcher,
            facilitator,
            detector,
            wallet,
            budget: BudgetStore::new(store.clone()),
            ledger: Arc::new(SpendingLedger::new(store.clone())),
            pending: Arc::new(PendingStore::new(store.clone())),
            receipts: Arc::new(ReceiptRecorder::new(store)),
            lock: AdvisoryLock::new(data_dir, BUDGET_LOCK),
            notifier: SettlementNotifier::new(),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Outcome channel for optimistic settlements.
    pub fn notifier(&self) -> &SettlementNotifier {
        &self.notifier
    }

    /// The spending ledger, for history surfaces.
    pub fn ledger(&self) -> &SpendingLedger {
        &self.ledger
    }

    /// The receipt log.
    pub fn receipts(&self) -> &ReceiptRecorder {
        &self.receipts
    }

    /// Startup sweep resolving orphaned pending settlements to failed.
    pub async fn recover(&self) -> EngineResult<usize> {
        recover_pending(&self.pending, &self.ledger, &self.notifier, &self.lock).await
    }

    /// Fetch a resource, paying for it if it asks.
    pub async fn fetch_with_payment(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> EngineResult<FetchSuccess> {
        let context_key = opts.context.clone().unwrap_or_else(|| url.to_string());
        let _in_flight = InFlightGuard::mark(&self.in_flight, &context_key)?;

        let timeout = Duration::from_millis(opts.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        let response = self.fetcher.fetch(url, &[], timeout).await?;

        let detection = self.detector.detect(
            response.status,
            response.payment_required_header.as_deref(),
            &response.body,
        );

        match detection {
            Detection::None => {
                self.receipts.record(Receipt::intent(url))?;
                Ok(FetchSuccess {
                    status_code: response.status,
                    content_type: response.content_type,
                    content: response.body,
                    payment: None,
                })
            }
            Detection::Protocol402 { offer } => {
                debug!(url, amount = %offer.amount, "402 payment signal");
                self.pay_402(url, offer, &opts, timeout).await
            }
            Detection::Inline { offer } => {
                debug!(url, mode = ?offer.mode, amount = %offer.amount, "inline payment signal");
                match offer.mode {
                    OfferMode::Client => {
                        self.pay_inline_client(url, response, offer, &opts).await
                    }
                    OfferMode::Server => {
                        self.pay_inline_server(url, offer, &opts, timeout).await
                    }
                }
            }
        }
    }

    /// 402 fallback path: sign, retry the request with the payment header,
    /// and take content from the retried response.
    async fn pay_402(
        &self,
        url: &str,
        offer: PaymentOffer,
        opts: &FetchOptions,
        timeout: Duration,
    ) -> EngineResult<FetchSuccess> {
        let authorized = self.gate_and_sign(url, &offer, opts).await?;
        let header = authorized.payload.to_header()?;

        let retried = self
            .fetcher
            .fetch(url, &[(HEADER_PAYMENT.to_string(), header)], timeout)
            .await?;

        if !(200..300).contains(&retried.status) {
            self.record_failed(url, &offer, &authorized, PaymentMode::Http402, "rejected")?;
            return Err(EngineError::SettleFailed(format!(
                "resource returned {} after payment",
                retried.status
            )));
        }

        let settle = retried
            .payment_response_header
            .as_deref()
            .and_then(parse_payment_response);
        let transaction = settle.as_ref().and_then(|s| s.transaction.clone());

        self.record_settled(
            url,
            &offer,
            &authorized,
            PaymentMode::Http402,
            transaction.clone(),
        )?;
        drop(authorized.lock_guard);

        Ok(FetchSuccess {
            status_code: retried.status,
            content_type: retried.content_type,
            content: retried.body,
            payment: Some(PaymentInfo {
                request_id: authorized.request_id,
                amount: offer.amount.clone(),
                network: offer.network.clone(),
                mode: PaymentMode::Http402,
                transaction,
                settled: true,
            }),
        })
    }

    /// Inline client mode: this process settles with the facilitator, either
    /// synchronously or optimistically in the background.
    async fn pay_inline_client(
        &self,
        url: &str,
        response: FetchedResponse,
        offer: PaymentOffer,
        opts: &FetchOptions,
    ) -> EngineResult<FetchSuccess> {
        let authorized = self.gate_and_sign(url, &offer, opts).await?;

        if opts.optimistic {
            return self.settle_optimistic(url, response, offer, authorized, opts);
        }

        let settle = self
            .facilitator
            .settle(
                &offer.facilitator_url,
                offer.site_key.as_deref(),
                &authorized.payload,
                &offer.requirement(),
            )
            .await;

        let settle = match settle {
            Ok(settle) => settle,
            Err(err) => {
                self.record_failed(url, &offer, &authorized, PaymentMode::Client, "rejected")?;
                return Err(err.into());
            }
        };

        self.record_settled(
            url,
            &offer,
            &authorized,
            PaymentMode::Client,
            settle.transaction.clone(),
        )?;
        drop(authorized.lock_guard);

        Ok(FetchSuccess {
            status_code: response.status,
            content_type: response.content_type,
            content: response.body,
            payment: Some(PaymentInfo {
                request_id: authorized.request_id,
                amount: offer.amount.clone(),
                network: offer.network.clone(),
                mode: PaymentMode::Client,
                transaction: settle.transaction,
                settled: true,
            }),
        })
    }

    /// Inline server mode: the signed payload goes to the page's payment
    /// endpoint, which verifies, settles, and responds with the unlocked
    /// content.
    async fn pay_inline_server(
        &self,
        url: &str,
        offer: PaymentOffer,
        opts: &FetchOptions,
        timeout: Duration,
    ) -> EngineResult<FetchSuccess> {
        let payment_url = offer
            .payment_url
            .clone()
            .ok_or(EngineError::MissingPaymentUrl)?;
        validate_outbound_url(&payment_url)
            .await
            .map_err(|e| EngineError::PaymentUrlError {
                status: 0,
                message: e.to_string(),
            })?;

        let authorized = self.gate_and_sign(url, &offer, opts).await?;

        let body = json!({
            "paymentPayload": authorized.payload,
            "paymentRequirements": offer.requirement(),
        });
        let paid = self.fetcher.post_json(&payment_url, &body, timeout).await?;

        if !(200..300).contains(&paid.status) {
            self.record_failed(url, &offer, &authorized, PaymentMode::Server, "rejected")?;
            return Err(EngineError::PaymentUrlError {
                status: paid.status,
                message: truncate(&paid.body, 200),
            });
        }

        let settle = paid
            .payment_response_header
            .as_deref()
            .and_then(parse_payment_response);
        let transaction = settle.as_ref().and_then(|s| s.transaction.clone());

        self.record_settled(
            url,
            &offer,
            &authorized,
            PaymentMode::Server,
            transaction.clone(),
        )?;
        drop(authorized.lock_guard);

        Ok(FetchSuccess {
            status_code: paid.status,
            content_type: paid.content_type,
            content: paid.body,
            payment: Some(PaymentInfo {
                request_id: authorized.request_id,
                amount: offer.amount.clone(),
                network: offer.network.clone(),
                mode: PaymentMode::Server,
                transaction,
                settled: true,
            }),
        })
    }

    /// Optimistic completion: persist the pending marker and ledger entry
    /// under the lock, release it, hand back a provisional result, and let a
    /// background task settle.
    fn settle_optimistic(
        &self,
        url: &str,
        response: FetchedResponse,
        offer: PaymentOffer,
        authorized: Authorized,
        opts: &FetchOptions,
    ) -> EngineResult<FetchSuccess> {
        self.ledger.append(LedgerEntry {
            ts: Utc::now(),
            url: url.to_string(),
            amount: offer.amount.clone(),
            asset: offer.asset.clone(),
            network: offer.network.clone(),
            tx_hash: None,
            mode: PaymentMode::Client,
            status: SettlementStatus::Pending,
            request_id: Some(authorized.request_id.clone()),
            fail_reason: None,
        })?;
        self.pending.add(PendingSettlement {
            request_id: authorized.request_id.clone(),
            context: opts.context.clone(),
            url: url.to_string(),
            amount: offer.amount.clone(),
            network: offer.network.clone(),
            payload: authorized.payload.clone(),
            signed_at: Utc::now(),
        })?;
        // Lock covered the check and the pending append only; settlement is
        // deferred.
        drop(authorized.lock_guard);

        let facilitator = self.facilitator.clone();
        let lock = self.lock.clone();
        let ledger = self.ledger.clone();
        let pending = self.pending.clone();
        let receipts = self.receipts.clone();
        let notifier = self.notifier.clone();
        let request_id = authorized.request_id.clone();
        let context = authorized.context.clone();
        let payer = authorized.payer.clone();
        let payload = authorized.payload.clone();
        let task_offer = offer.clone();
        let task_url = url.to_string();

        tokio::spawn(async move {
            let result = facilitator
                .settle(
                    &task_offer.facilitator_url,
                    task_offer.site_key.as_deref(),
                    &payload,
                    &task_offer.requirement(),
                )
                .await;

            // The ledger and marker rewrites below share files with the
            // budget gate in every process on this data dir, so they run
            // under the same advisory lock. The settle call itself stays
            // outside it.
            let guard = match lock.acquire().await {
                Ok(guard) => Some(guard),
                Err(err) => {
                    warn!(
                        request_id = %request_id,
                        %err,
                        "budget lock unavailable while recording settlement"
                    );
                    None
                }
            };

            let outcome = match result {
                Ok(settle) => {
                    let _ = ledger.update_status(
                        &request_id,
                        SettlementStatus::Settled,
                        settle.transaction.clone(),
                        None,
                    );
                    let _ = receipts.record(Receipt::settled(
                        &task_url,
                        context,
                        SettlementRecord {
                            transaction: settle.transaction.clone(),
                            payer: Some(payer),
                            pay_to: task_offer.pay_to.clone(),
                            amount: task_offer.amount.clone(),
                            network: task_offer.network.clone(),
                        },
                    ));
                    info!(request_id = %request_id, "optimistic settlement confirmed");
                    SettlementOutcome {
                        request_id: request_id.clone(),
                        status: SettlementStatus::Settled,
                        transaction: settle.transaction,
                        reason: None,
                    }
                }
                Err(err) => {
                    warn!(request_id = %request_id, %err, "optimistic settlement failed");
                    let _ = ledger.update_status(
                        &request_id,
                        SettlementStatus::Failed,
                        None,
                        Some(err.to_string()),
                    );
                    SettlementOutcome {
                        request_id: request_id.clone(),
                        status: SettlementStatus::Failed,
                        transaction: None,
                        reason: Some(err.to_string()),
                    }
                }
            };
            let _ = pending.remove(&request_id);
            drop(guard);
            notifier.notify(outcome);
        });

        Ok(FetchSuccess {
            status_code: response.status,
            content_type: response.content_type,
            content: response.body,
            payment: Some(PaymentInfo {
                request_id: authorized.request_id,
                amount: offer.amount.clone(),
                network: offer.network.clone(),
                mode: PaymentMode::Client,
                transaction: None,
                settled: false,
            }),
        })
    }

    /// The shared front half of every payment path: asset validation, budget
    /// gate under the advisory lock, key resolution, and signing. Returns
    /// with the lock still held so callers control its scope.
    async fn gate_and_sign(
        &self,
        url: &str,
        offer: &PaymentOffer,
        opts: &FetchOptions,
    ) -> EngineResult<Authorized> {
        validate_asset(&offer.network, &offer.asset)?;
        if let Some(wanted) = &opts.network {
            let wanted_chain = chain_for(wanted).ok_or_else(|| {
                EngineError::AssetMismatch(format!("unknown requested network: {wanted}"))
            })?;
            let offer_chain = chain_for(&offer.network).ok_or_else(|| {
                EngineError::AssetMismatch(format!("unknown offer network: {}", offer.network))
            })?;
            if wanted_chain.chain_id != offer_chain.chain_id {
                return Err(EngineError::AssetMismatch(format!(
                    "offer targets {} but {} was requested",
                    offer.network, wanted
                )));
            }
        }

        let price = parse_units(&offer.amount)?;
        let max_price = opts
            .max_price
            .as_deref()
            .map(|s| parse_decimal(s, USDC_DECIMALS))
            .transpose()?;

        let lock_guard = self.lock.acquire().await?;
        let config = self.budget.load()?;
        let totals = self.ledger.totals()?;

        let context = AuthorizationContext {
            limits: config.clone(),
            spent_today: totals.spent_today.to_string(),
            spent_total: totals.spent_total.to_string(),
            requested: offer.amount.clone(),
        };

        if let BudgetVerdict::Declined(reason) = check_budget(price, max_price, &config, &totals)?
        {
            return Err(self.decline(url, &context, reason, price, max_price, &config));
        }

        let resolved = self
            .wallet
            .resolve_private_key(opts.password.as_deref())
            .await?;
        let payer = resolved.address.to_checksum(None);

        let domain = match &offer.domain_extra {
            Some(domain) => domain.clone(),
            None => {
                self.facilitator
                    .get_supported(
                        &offer.facilitator_url,
                        offer.site_key.as_deref(),
                        &offer.network,
                    )
                    .await?
            }
        };
        let payload = sign_authorization(&resolved.key, &domain, offer)?;

        Ok(Authorized {
            request_id: new_request_id(),
            payload,
            payer,
            context,
            lock_guard,
        })
    }

    /// Write the declined receipt and build the matching error.
    fn decline(
        &self,
        url: &str,
        context: &AuthorizationContext,
        reason: DeclineReason,
        price: alloy_primitives::U256,
        max_price: Option<alloy_primitives::U256>,
        config: &BudgetConfig,
    ) -> EngineError {
        let requested = format_units(price, USDC_DECIMALS);
        let (kind, limit) = match reason {
            DeclineReason::NoBudget => ("no_budget", None),
            DeclineReason::MaxPrice => (
                "max_price",
                max_price.map(|m| format_units(m, USDC_DECIMALS)),
            ),
            DeclineReason::PerRequest => ("per_request", config.per_request_max.clone()),
            DeclineReason::Daily => ("daily", config.daily_max.clone()),
            DeclineReason::Total => ("total", config.total_max.clone()),
        };
        info!(url, kind, %requested, "payment declined by budget gate");

        let receipt = Receipt::declined(
            url,
            context.clone(),
            DeclineRecord {
                reason: kind.to_string(),
                limit: limit.clone(),
                requested: requested.clone(),
            },
        );
        if let Err(err) = self.receipts.record(receipt) {
            warn!(%err, "failed to record decline receipt");
        }

        match reason {
            DeclineReason::NoBudget => EngineError::NoBudget,
            DeclineReason::MaxPrice => EngineError::MaxPriceExceeded {
                requested,
                limit: limit.unwrap_or_default(),
            },
            kind => EngineError::BudgetExceeded {
                kind,
                requested,
                limit: limit.unwrap_or_default(),
            },
        }
    }

    fn record_settled(
        &self,
        url: &str,
        offer: &PaymentOffer,
        authorized: &Authorized,
        mode: PaymentMode,
        transaction: Option<String>,
    ) -> EngineResult<()> {
        self.ledger.append(LedgerEntry {
            ts: Utc::now(),
            url: url.to_string(),
            amount: offer.amount.clone(),
            asset: offer.asset.clone(),
            network: offer.network.clone(),
            tx_hash: transaction.clone(),
            mode,
            status: SettlementStatus::Settled,
            request_id: Some(authorized.request_id.clone()),
            fail_reason: None,
        })?;
        self.receipts.record(Receipt::settled(
            url,
            authorized.context.clone(),
            SettlementRecord {
                transaction,
                payer: Some(authorized.payer.clone()),
                pay_to: offer.pay_to.clone(),
                amount: offer.amount.clone(),
                network: offer.network.clone(),
            },
        ))?;
        Ok(())
    }

    fn record_failed(
        &self,
        url: &str,
        offer: &PaymentOffer,
        authorized: &Authorized,
        mode: PaymentMode,
        reason: &str,
    ) -> EngineResult<()> {
        self.ledger.append(LedgerEntry {
            ts: Utc::now(),
            url: url.to_string(),
            amount: offer.amount.clone(),
            asset: offer.asset.clone(),
            network: offer.network.clone(),
            tx_hash: None,
            mode,
            status: SettlementStatus::Failed,
            request_id: Some(authorized.request_id.clone()),
            fail_reason: Some(reason.to_string()),
        })?;
        Ok(())
    }
}

/// Output of the shared gate-and-sign front half.
struct Authorized {
    request_id: String,
    payload: PaymentPayload,
    /// Checksummed payer address.
    payer: String,
    context: AuthorizationContext,
    lock_guard: LockGuard,
}

/// Removes the context marker on every exit path.
struct InFlightGuard {
    set: Arc<StdMutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    fn mark(set: &Arc<StdMutex<HashSet<String>>>, key: &str) -> EngineResult<Self> {
        let mut guard = set.lock().expect("in-flight mutex poisoned");
        if !guard.insert(key.to_string()) {
            return Err(EngineError::PaymentInProgress {
                context: key.to_string(),
            });
        }
        Ok(Self {
            set: set.clone(),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("in-flight mutex poisoned")
            .remove(&self.key);
    }
}

fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("pay-{}", hex::encode(bytes))
}

/// Parse a base64 `X-PAYMENT-RESPONSE` header, tolerating malformed values.
fn parse_payment_response(header: &str) -> Option<SettleResponse> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(header.trim())
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
