//! EIP-712 transfer authorization signing.
//!
//! Builds a time-bounded `TransferWithAuthorization` message bound to the
//! token contract and chain the facilitator advertises, and signs it with the
//! resolved wallet key. Signing mutates nothing; the only non-determinism is
//! the random nonce.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, FixedBytes, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, sol, SolStruct};
use rand::RngCore;

use paywright_crypto::PrivateKey;

use crate::error::{X402Error, X402Result};
use crate::types::{
    AuthorizationWire, Eip712DomainInfo, ExactPayload, PaymentOffer, PaymentPayload,
    AUTHORIZATION_VALIDITY_SECONDS, X402_VERSION,
};

sol! {
    /// EIP-3009 gasless transfer authorization struct.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// Sign a transfer authorization for an offer.
///
/// The validity window is `[0, now + 300s]`; a captured signature cannot be
/// replayed far into the future.
pub fn sign_authorization(
    key: &PrivateKey,
    domain_info: &Eip712DomainInfo,
    offer: &PaymentOffer,
) -> X402Result<PaymentPayload> {
    let signer = PrivateKeySigner::from_slice(key.as_bytes())
        .map_err(|e| X402Error::Signing(e.to_string()))?;

    let to = parse_address(&offer.pay_to)?;
    let verifying_contract = parse_address(&domain_info.verifying_contract)?;
    let value = U256::from_str_radix(&offer.amount, 10).map_err(|_| {
        X402Error::MalformedOffer {
            reason: format!("amount is not an unsigned integer: {}", offer.amount),
        }
    })?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| X402Error::Internal(e.to_string()))?
        .as_secs();
    let valid_before = now + AUTHORIZATION_VALIDITY_SECONDS;

    let mut nonce = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let authorization = TransferWithAuthorization {
        from: signer.address(),
        to,
        value,
        validAfter: U256::ZERO,
        validBefore: U256::from(valid_before),
        nonce: FixedBytes(nonce),
    };

    let domain = eip712_domain! {
        name: domain_info.name.clone(),
        version: domain_info.version.clone(),
        chain_id: domain_info.chain_id,
        verifying_contract: verifying_contract,
    };

    let hash = authorization.eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash_sync(&hash)
        .map_err(|e| X402Error::Signing(e.to_string()))?;

    Ok(PaymentPayload {
        x402_version: X402_VERSION,
        scheme: offer.scheme.clone(),
        network: offer.network.clone(),
        payload: ExactPayload {
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
            authorization: AuthorizationWire {
                from: signer.address().to_checksum(None),
                to: to.to_checksum(None),
                value: value.to_string(),
                valid_after: "0".to_string(),
                valid_before: valid_before.to_string(),
                nonce: format!("0x{}", hex::encode(nonce)),
            },
        },
    })
}

fn parse_address(s: &str) -> X402Result<Address> {
    Address::from_str(s).map_err(|_| X402Error::MalformedOffer {
        reason: format!("invalid address: {s}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OfferMode, SCHEME_EXACT};

    fn offer() -> PaymentOffer {
        PaymentOffer {
            scheme: SCHEME_EXACT.to_string(),
            network: "eip155:84532".to_string(),
            amount: "10000".to_string(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            pay_to: "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20".to_string(),
            mode: OfferMode::Client,
            facilitator_url: "https://facilitator.example/v2".to_string(),
            site_key: None,
            payment_url: None,
            domain_extra: None,
        }
    }

    fn domain_info() -> Eip712DomainInfo {
        Eip712DomainInfo {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
            chain_id: 84532,
            verifying_contract: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
        }
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        let signer = PrivateKeySigner::random();
        let key = PrivateKey::from_bytes(signer.to_bytes().0);

        let payload = sign_authorization(&key, &domain_info(), &offer()).unwrap();
        let auth = &payload.payload.authorization;
        assert_eq!(auth.value, "10000");
        assert_eq!(auth.valid_after, "0");

        // Rebuild the typed struct and recover the signer address.
        let nonce_bytes: [u8; 32] = hex::decode(auth.nonce.trim_start_matches("0x"))
            .unwrap()
            .try_into()
            .unwrap();
        let typed = TransferWithAuthorization {
            from: Address::from_str(&auth.from).unwrap(),
            to: Address::from_str(&auth.to).unwrap(),
            value: U256::from_str_radix(&auth.value, 10).unwrap(),
            validAfter: U256::ZERO,
            validBefore: U256::from_str_radix(&auth.valid_before, 10).unwrap(),
            nonce: FixedBytes(nonce_bytes),
        };
        let domain = eip712_domain! {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
            chain_id: 84532,
            verifying_contract: Address::from_str("0x036CbD53842c5426634e7929541eC2318f3dCF7e").unwrap(),
        };
        let hash = typed.eip712_signing_hash(&domain);

        let sig_bytes = hex::decode(payload.payload.signature.trim_start_matches("0x")).unwrap();
        let signature = alloy_primitives::Signature::from_raw(&sig_bytes).unwrap();
        let recovered = signature.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_validity_window_is_five_minutes() {
        let signer = PrivateKeySigner::random();
        let key = PrivateKey::from_bytes(signer.to_bytes().0);
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let payload = sign_authorization(&key, &domain_info(), &offer()).unwrap();
        let valid_before: u64 = payload
            .payload
            .authorization
            .valid_before
            .parse()
            .unwrap();
        assert!(valid_before >= before + AUTHORIZATION_VALIDITY_SECONDS);
        assert!(valid_before <= before + AUTHORIZATION_VALIDITY_SECONDS + 5);
    }

    #[test]
    fn test_fresh_nonce_per_signature() {
        let signer = PrivateKeySigner::random();
        let key = PrivateKey::from_bytes(signer.to_bytes().0);
        let a = sign_authorization(&key, &domain_info(), &offer()).unwrap();
        let b = sign_authorization(&key, &domain_info(), &offer()).unwrap();
        assert_ne!(
            a.payload.authorization.nonce,
            b.payload.authorization.nonce
        );
    }

    #[test]
    fn test_bad_payee_address_rejected() {
        let signer = PrivateKeySigner::random();
        let key = PrivateKey::from_bytes(signer.to_bytes().0);
        let mut bad = offer();
        bad.pay_to = "not-an-address".to_string();
        assert!(matches!(
            sign_authorization(&key, &domain_info(), &bad),
            Err(X402Error::MalformedOffer { .. })
        ));
    }
}
