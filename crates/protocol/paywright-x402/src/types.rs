//! x402 protocol wire types.
//!
//! Covers the three signal encodings a page can carry, the facilitator REST
//! surface, and the payment payload relayed in the `X-PAYMENT` header. All
//! wire shapes are camelCase JSON; inline and header signals are transported
//! base64-encoded.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{X402Error, X402Result};

/// x402 protocol version.
pub const X402_VERSION: u32 = 2;

/// HTTP header carrying payment terms on a 402 response (server → client).
pub const HEADER_PAYMENT_REQUIRED: &str = "X-PAYMENT-REQUIRED";

/// HTTP header carrying the signed payment payload (client → server).
pub const HEADER_PAYMENT: &str = "X-PAYMENT";

/// HTTP header carrying settlement confirmation (server → client).
pub const HEADER_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// The only payment scheme currently supported.
pub const SCHEME_EXACT: &str = "exact";

/// Seconds a signed authorization stays valid.
pub const AUTHORIZATION_VALIDITY_SECONDS: u64 = 300;

// =============================================================================
// Signals
// =============================================================================

/// Who settles the signed authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferMode {
    /// This process settles directly with the facilitator.
    Client,
    /// The signed payload is posted to the page's own payment endpoint.
    Server,
}

/// A single accepted payment method inside a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// Payment scheme (currently always "exact").
    pub scheme: String,

    /// Network identifier (CAIP-2, e.g. "eip155:8453").
    pub network: String,

    /// Amount in smallest units, as a decimal string.
    pub amount: String,

    /// Token contract address.
    pub asset: String,

    /// Payee address.
    pub pay_to: String,

    /// EIP-712 domain parameters, when the signalling side already knows
    /// them. Absent, they come from the facilitator's `/supported`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Eip712DomainInfo>,
}

/// Inline page signal, base64-JSON behind a meta tag, a script data
/// attribute, or an inline init call. All three carry this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSignal {
    /// x402 protocol version.
    pub x402_version: u32,

    /// Settlement mode.
    pub mode: OfferMode,

    /// Facilitator base URL.
    pub facilitator_url: String,

    /// Site key for facilitator Bearer auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,

    /// Server-mode payment submission endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,

    /// Accepted payment methods, best first.
    pub accepts: Vec<PaymentRequirement>,
}

impl InlineSignal {
    /// Decode from the base64 text found in a page marker.
    pub fn from_base64(encoded: &str) -> X402Result<Self> {
        decode_base64_json(encoded)
    }
}

/// Resource descriptor carried by the 402 header signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the gated resource.
    pub url: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// MIME type of the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Payment terms delivered in the `X-PAYMENT-REQUIRED` header of a 402
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// x402 protocol version.
    pub x402_version: u32,

    /// Facilitator base URL.
    pub facilitator_url: String,

    /// Site key for facilitator Bearer auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,

    /// The resource being paid for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Accepted payment methods.
    pub accepts: Vec<PaymentRequirement>,
}

impl PaymentRequired {
    /// Decode from the base64 header value.
    pub fn from_header(header_value: &str) -> X402Result<Self> {
        decode_base64_json(header_value)
    }
}

// =============================================================================
// Normalized offer
// =============================================================================

/// A normalized payment offer, however it was signalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOffer {
    pub scheme: String,
    pub network: String,
    /// Amount in smallest units, decimal string.
    pub amount: String,
    /// Token contract address.
    pub asset: String,
    /// Payee address.
    pub pay_to: String,
    pub mode: OfferMode,
    pub facilitator_url: String,
    pub site_key: Option<String>,
    pub payment_url: Option<String>,
    /// Domain parameters carried by the signal itself, when present.
    pub domain_extra: Option<Eip712DomainInfo>,
}

impl PaymentOffer {
    /// Normalize an inline signal. The first "exact" accepts entry wins.
    pub fn from_inline(signal: &InlineSignal) -> X402Result<Self> {
        let accept = first_exact(&signal.accepts)?;
        Ok(Self {
            scheme: accept.scheme.clone(),
            network: accept.network.clone(),
            amount: accept.amount.clone(),
            asset: accept.asset.clone(),
            pay_to: accept.pay_to.clone(),
            mode: signal.mode,
            facilitator_url: signal.facilitator_url.clone(),
            site_key: signal.site_key.clone(),
            payment_url: signal.payment_url.clone(),
            domain_extra: accept.extra.clone(),
        })
    }

    /// Normalize a 402 header signal. The fallback path always settles
    /// through the facilitator, so mode is client.
    pub fn from_payment_required(required: &PaymentRequired) -> X402Result<Self> {
        let accept = first_exact(&required.accepts)?;
        Ok(Self {
            scheme: accept.scheme.clone(),
            network: accept.network.clone(),
            amount: accept.amount.clone(),
            asset: accept.asset.clone(),
            pay_to: accept.pay_to.clone(),
            mode: OfferMode::Client,
            facilitator_url: required.facilitator_url.clone(),
            site_key: required.site_key.clone(),
            payment_url: None,
            domain_extra: accept.extra.clone(),
        })
    }

    /// The accepts entry this offer was normalized from, for the settle wire.
    pub fn requirement(&self) -> PaymentRequirement {
        PaymentRequirement {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            amount: self.amount.clone(),
            asset: self.asset.clone(),
            pay_to: self.pay_to.clone(),
            extra: self.domain_extra.clone(),
        }
    }
}

fn first_exact(accepts: &[PaymentRequirement]) -> X402Result<&PaymentRequirement> {
    accepts
        .iter()
        .find(|a| a.scheme == SCHEME_EXACT)
        .ok_or_else(|| match accepts.first() {
            Some(other) => X402Error::UnsupportedScheme {
                scheme: other.scheme.clone(),
            },
            None => X402Error::MalformedOffer {
                reason: "empty accepts list".to_string(),
            },
        })
}

// =============================================================================
// Payment payload (client → server / facilitator)
// =============================================================================

/// The signed transfer authorization fields, hex/decimal strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationWire {
    /// Payer address.
    pub from: String,

    /// Payee address.
    pub to: String,

    /// Amount in smallest units, decimal string.
    pub value: String,

    /// Unix seconds after which the authorization is valid.
    pub valid_after: String,

    /// Unix seconds before which the authorization is valid.
    pub valid_before: String,

    /// Random 32-byte nonce, 0x-prefixed hex.
    pub nonce: String,
}

/// Scheme-specific payload: the authorization plus its EIP-712 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    /// 65-byte signature, 0x-prefixed hex.
    pub signature: String,

    /// The signed authorization.
    pub authorization: AuthorizationWire,
}

/// Payment payload relayed in the `X-PAYMENT` header or the settle body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// x402 protocol version.
    pub x402_version: u32,

    /// The payment scheme used.
    pub scheme: String,

    /// Network the payment is for.
    pub network: String,

    /// Scheme-specific details.
    pub payload: ExactPayload,
}

impl PaymentPayload {
    /// Encode for the `X-PAYMENT` header.
    pub fn to_header(&self) -> X402Result<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| X402Error::Internal(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    /// Decode from a base64 header value.
    pub fn from_header(header_value: &str) -> X402Result<Self> {
        decode_base64_json(header_value)
    }
}

// =============================================================================
// Facilitator API
// =============================================================================

/// Response from `GET /supported`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    /// Supported payment kinds.
    pub kinds: Vec<SupportedKind>,
}

/// One supported scheme/network pair and its signing domain parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub scheme: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Eip712DomainInfo>,
}

/// EIP-712 domain parameters for a supported kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712DomainInfo {
    /// Domain name (e.g. "USD Coin").
    pub name: String,

    /// Domain version (e.g. "2").
    pub version: String,

    /// EVM chain id.
    pub chain_id: u64,

    /// Token contract the authorization is bound to.
    pub verifying_contract: String,
}

/// Request body for `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirement,
}

/// Response from `POST /settle`. `success: false` on HTTP 200 still means
/// the payment did not happen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,

    /// On-chain transaction reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    /// Remote-reported failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Request body for `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirement,
}

/// Response from `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

fn decode_base64_json<T: serde::de::DeserializeOwned>(encoded: &str) -> X402Result<T> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| X402Error::MalformedOffer {
            reason: format!("base64 decode error: {e}"),
        })?;
    serde_json::from_slice(&decoded).map_err(|e| X402Error::MalformedOffer {
        reason: format!("JSON parse error: {e}"),
    })
}
