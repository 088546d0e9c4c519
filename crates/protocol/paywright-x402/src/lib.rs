//! x402 micropayment protocol support for paywright.
//!
//! This crate implements the client half of the
//! [x402 payment protocol](https://www.x402.org/): recognizing that a fetched
//! resource demands payment, producing a signed gasless transfer
//! authorization, and settling it through a facilitator service.
//!
//! # Components
//!
//! - **[`types`]**: wire types for the three signal encodings, the payment
//!   payload headers, and the facilitator REST surface
//! - **[`detect`]**: the [`SignalDetector`] seam plus the default HTML
//!   detector, with 402-over-inline precedence
//! - **[`signer`]**: EIP-712 `TransferWithAuthorization` signing with a
//!   five-minute validity window
//! - **[`facilitator`]**: the [`Facilitator`] seam plus the HTTP client with
//!   a cached `/supported` lookup
//! - **[`guard`]**: HTTPS-only, non-private-address validation of every
//!   outbound facilitator and payment URL
//! - **[`assets`]**: per-network expected-token allow-list and explorer links

pub mod assets;
pub mod detect;
pub mod error;
pub mod facilitator;
pub mod guard;
pub mod signer;
pub mod types;

pub use assets::{chain_for, explorer_tx_url, validate_asset, ChainInfo};
pub use detect::{Detection, HtmlSignalDetector, SignalDetector};
pub use error::{X402Error, X402Result};
pub use facilitator::{Facilitator, HttpFacilitator};
pub use guard::validate_outbound_url;
pub use signer::sign_authorization;
pub use types::{
    AuthorizationWire, Eip712DomainInfo, ExactPayload, InlineSignal, OfferMode, PaymentOffer,
    PaymentPayload, PaymentRequired, PaymentRequirement, ResourceInfo, SettleRequest,
    SettleResponse, SupportedKind, SupportedResponse, VerifyRequest, VerifyResponse,
    AUTHORIZATION_VALIDITY_SECONDS, HEADER_PAYMENT, HEADER_PAYMENT_REQUIRED,
    HEADER_PAYMENT_RESPONSE, SCHEME_EXACT, X402_VERSION,
};
