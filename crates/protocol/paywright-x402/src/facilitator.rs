//! Facilitator client.
//!
//! Talks to the remote service that verifies a signed authorization and
//! executes the on-chain transfer. Domain parameters from `/supported` are
//! effectively static, so they are cached in memory for an hour per
//! facilitator URL and site key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{X402Error, X402Result};
use crate::guard::validate_outbound_url;
use crate::types::{
    Eip712DomainInfo, PaymentPayload, PaymentRequirement, SettleRequest, SettleResponse,
    SupportedResponse, VerifyRequest, VerifyResponse, SCHEME_EXACT,
};

/// Default HTTP timeout for facilitator requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a `/supported` answer stays valid.
const SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Operations against a facilitator service. Seam trait so the orchestrator
/// can be exercised without a network.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Fetch the EIP-712 domain parameters for a network from `/supported`.
    async fn get_supported(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        network: &str,
    ) -> X402Result<Eip712DomainInfo>;

    /// Optional pre-check of a signed payload.
    async fn verify(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> X402Result<VerifyResponse>;

    /// Settle a signed payload on-chain. `success: false` in the response is
    /// an error carrying the remote-reported reason, even on HTTP 200.
    async fn settle(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> X402Result<SettleResponse>;
}

/// HTTP facilitator client with a supported-kinds cache.
pub struct HttpFacilitator {
    client: Client,
    supported_cache: Mutex<HashMap<String, (Instant, SupportedResponse)>>,
}

impl HttpFacilitator {
    pub fn new() -> X402Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| {
                X402Error::FacilitatorNetwork(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            supported_cache: Mutex::new(HashMap::new()),
        })
    }

    fn cache_key(facilitator_url: &str, site_key: Option<&str>) -> String {
        format!("{}|{}", facilitator_url, site_key.unwrap_or(""))
    }

    async fn fetch_supported(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
    ) -> X402Result<SupportedResponse> {
        let key = Self::cache_key(facilitator_url, site_key);
        {
            let cache = self.supported_cache.lock().expect("cache mutex poisoned");
            if let Some((at, cached)) = cache.get(&key) {
                if at.elapsed() < SUPPORTED_CACHE_TTL {
                    return Ok(cached.clone());
                }
            }
        }

        let base = validate_outbound_url(facilitator_url).await?;
        let url = format!("{}/supported", base.as_str().trim_end_matches('/'));
        debug!(url = %url, "querying facilitator supported kinds");

        let mut request = self.client.get(&url);
        if let Some(site_key) = site_key {
            request = request.bearer_auth(site_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(X402Error::FacilitatorNetwork(format!(
                "facilitator /supported returned {status}: {body}"
            )));
        }

        let supported: SupportedResponse = response.json().await.map_err(|e| {
            X402Error::FacilitatorNetwork(format!("failed to parse supported response: {e}"))
        })?;
        debug!(kinds = supported.kinds.len(), "facilitator supported kinds fetched");

        let mut cache = self.supported_cache.lock().expect("cache mutex poisoned");
        cache.insert(key, (Instant::now(), supported.clone()));
        Ok(supported)
    }

    async fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        endpoint: &str,
        body: &Req,
    ) -> X402Result<Resp> {
        let base = validate_outbound_url(facilitator_url).await?;
        let url = format!("{}/{}", base.as_str().trim_end_matches('/'), endpoint);
        debug!(url = %url, "posting to facilitator");

        let mut request = self.client.post(&url).json(body);
        if let Some(site_key) = site_key {
            request = request.bearer_auth(site_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(X402Error::FacilitatorNetwork(format!(
                "facilitator /{endpoint} returned {status}: {text}"
            )));
        }
        response.json().await.map_err(|e| {
            X402Error::FacilitatorNetwork(format!("failed to parse {endpoint} response: {e}"))
        })
    }
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn get_supported(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        network: &str,
    ) -> X402Result<Eip712DomainInfo> {
        let supported = self.fetch_supported(facilitator_url, site_key).await?;
        supported
            .kinds
            .iter()
            .find(|k| k.scheme == SCHEME_EXACT && k.network.eq_ignore_ascii_case(network))
            .and_then(|k| k.extra.clone())
            .ok_or_else(|| X402Error::NoSupportedKind {
                network: network.to_string(),
            })
    }

    async fn verify(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> X402Result<VerifyResponse> {
        let request = VerifyRequest {
            payment_payload: payload.clone(),
            payment_requirements: requirement.clone(),
        };
        let response: VerifyResponse = self
            .post_json(facilitator_url, site_key, "verify", &request)
            .await
            .map_err(|e| match e {
                X402Error::FacilitatorNetwork(reason) => {
                    X402Error::VerificationFailed { reason }
                }
                other => other,
            })?;

        if response.is_valid {
            debug!(payer = ?response.payer, "payment verified");
        } else {
            warn!(reason = ?response.invalid_reason, "payment verification failed");
        }
        Ok(response)
    }

    async fn settle(
        &self,
        facilitator_url: &str,
        site_key: Option<&str>,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> X402Result<SettleResponse> {
        let request = SettleRequest {
            payment_payload: payload.clone(),
            payment_requirements: requirement.clone(),
        };
        let response: SettleResponse = self
            .post_json(facilitator_url, site_key, "settle", &request)
            .await?;

        if !response.success {
            let reason = response
                .error_reason
                .clone()
                .unwrap_or_else(|| "unknown settlement failure".to_string());
            warn!(%reason, "facilitator reported settlement failure");
            return Err(X402Error::SettlementFailed { reason });
        }

        info!(
            transaction = ?response.transaction,
            network = ?response.network,
            "payment settled"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for HttpFacilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_distinguishes_site_keys() {
        let a = HttpFacilitator::cache_key("https://f.example/v2", None);
        let b = HttpFacilitator::cache_key("https://f.example/v2", Some("sk_live"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_settle_rejects_private_facilitator() {
        let facilitator = HttpFacilitator::new().unwrap();
        let payload = PaymentPayload {
            x402_version: crate::types::X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: "eip155:8453".to_string(),
            payload: crate::types::ExactPayload {
                signature: "0x00".to_string(),
                authorization: crate::types::AuthorizationWire {
                    from: "0x0".to_string(),
                    to: "0x0".to_string(),
                    value: "1".to_string(),
                    valid_after: "0".to_string(),
                    valid_before: "1".to_string(),
                    nonce: "0x00".to_string(),
                },
            },
        };
        let requirement = PaymentRequirement {
            scheme: SCHEME_EXACT.to_string(),
            network: "eip155:8453".to_string(),
            amount: "1".to_string(),
            asset: "0x0".to_string(),
            pay_to: "0x0".to_string(),
            extra: None,
        };
        let err = facilitator
            .settle("https://192.168.0.10/v2", None, &payload, &requirement)
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::UnsafeUrl { .. }));
    }
}
