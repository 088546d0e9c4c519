//! Payment signal detection.
//!
//! Classifies a fetched response into no-payment, protocol-402, or inline
//! signal, and normalizes whichever signal was found into a [`PaymentOffer`].
//! An HTTP 402 status always wins over any inline marker in the same body.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::types::{InlineSignal, PaymentOffer, PaymentRequired};

/// Outcome of signal detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// No payment signal; pass the content through unmodified.
    None,
    /// Standard 402 fallback signalling via response headers.
    Protocol402 { offer: PaymentOffer },
    /// Page-embedded signal; the offer carries the settlement mode.
    Inline { offer: PaymentOffer },
}

/// Classifies a fetched response. Implementations must be pure over their
/// inputs; page-parsing heuristics live behind this seam.
pub trait SignalDetector: Send + Sync {
    /// `payment_required_header` is the raw `X-PAYMENT-REQUIRED` value when
    /// the response carried one.
    fn detect(
        &self,
        status: u16,
        payment_required_header: Option<&str>,
        body: &str,
    ) -> Detection;
}

/// Default detector over HTML bodies.
///
/// Inline signals are recognized in three equivalent encodings, checked in
/// precedence order with the first parseable one winning:
/// 1. `<meta name="x402-payment" content="<base64>">`
/// 2. `data-x402="<base64>"` on any element (typically a script tag)
/// 3. an inline `x402.init("<base64>")` call
///
/// A marker that fails to decode is skipped rather than treated as an error;
/// imperfect pages degrade to no-signal.
#[derive(Debug, Default)]
pub struct HtmlSignalDetector;

fn meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<meta\s[^>]*name\s*=\s*["']x402-payment["'][^>]*content\s*=\s*["']([A-Za-z0-9+/=\s]+)["']"#,
        )
        .expect("static regex")
    })
}

fn meta_re_reversed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<meta\s[^>]*content\s*=\s*["']([A-Za-z0-9+/=\s]+)["'][^>]*name\s*=\s*["']x402-payment["']"#,
        )
        .expect("static regex")
    })
}

fn data_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)data-x402\s*=\s*["']([A-Za-z0-9+/=\s]+)["']"#).expect("static regex")
    })
}

fn init_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"x402\s*\.\s*init\s*\(\s*["']([A-Za-z0-9+/=\s]+)["']\s*\)"#)
            .expect("static regex")
    })
}

impl HtmlSignalDetector {
    fn inline_signal(body: &str) -> Option<InlineSignal> {
        let candidates = [
            meta_re()
                .captures(body)
                .or_else(|| meta_re_reversed().captures(body)),
            data_attr_re().captures(body),
            init_call_re().captures(body),
        ];
        for captures in candidates.into_iter().flatten() {
            let encoded = captures.get(1).map(|m| m.as_str())?;
            match InlineSignal::from_base64(encoded) {
                Ok(signal) => return Some(signal),
                Err(err) => {
                    debug!(%err, "skipping unparseable inline payment marker");
                }
            }
        }
        None
    }
}

impl SignalDetector for HtmlSignalDetector {
    fn detect(
        &self,
        status: u16,
        payment_required_header: Option<&str>,
        body: &str,
    ) -> Detection {
        // A 402 status takes the header path even when the body also carries
        // an inline marker.
        if status == 402 {
            let Some(header) = payment_required_header else {
                debug!("402 response without payment terms header, passing through");
                return Detection::None;
            };
            return match PaymentRequired::from_header(header)
                .and_then(|r| PaymentOffer::from_payment_required(&r))
            {
                Ok(offer) => Detection::Protocol402 { offer },
                Err(err) => {
                    debug!(%err, "unparseable 402 payment terms, passing through");
                    Detection::None
                }
            };
        }

        match Self::inline_signal(body).as_ref().map(PaymentOffer::from_inline) {
            Some(Ok(offer)) => Detection::Inline { offer },
            Some(Err(err)) => {
                debug!(%err, "inline signal carried no usable offer, passing through");
                Detection::None
            }
            None => Detection::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OfferMode, PaymentRequirement, ResourceInfo, SCHEME_EXACT, X402_VERSION};
    use base64::Engine as _;

    fn signal(mode: OfferMode) -> String {
        let signal = InlineSignal {
            x402_version: X402_VERSION,
            mode,
            facilitator_url: "https://facilitator.example/v2".to_string(),
            site_key: None,
            payment_url: match mode {
                OfferMode::Server => Some("https://example.com/pay".to_string()),
                OfferMode::Client => None,
            },
            accepts: vec![PaymentRequirement {
                scheme: SCHEME_EXACT.to_string(),
                network: "eip155:8453".to_string(),
                amount: "10000".to_string(),
                asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
                pay_to: "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20".to_string(),
                extra: None,
            }],
        };
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&signal).unwrap())
    }

    fn header_signal() -> String {
        let required = PaymentRequired {
            x402_version: X402_VERSION,
            facilitator_url: "https://facilitator.example/v2".to_string(),
            site_key: None,
            resource: Some(ResourceInfo {
                url: "https://example.com/article".to_string(),
                description: "Premium article".to_string(),
                mime_type: None,
            }),
            accepts: vec![PaymentRequirement {
                scheme: SCHEME_EXACT.to_string(),
                network: "eip155:8453".to_string(),
                amount: "25000".to_string(),
                asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
                pay_to: "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20".to_string(),
                extra: None,
            }],
        };
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&required).unwrap())
    }

    #[test]
    fn test_plain_page_is_none() {
        let detector = HtmlSignalDetector;
        assert_eq!(
            detector.detect(200, None, "<html><body>free content</body></html>"),
            Detection::None
        );
    }

    #[test]
    fn test_meta_tag_detected() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<html><head><meta name="x402-payment" content="{}"></head></html>"#,
            signal(OfferMode::Client)
        );
        match detector.detect(200, None, &body) {
            Detection::Inline { offer } => {
                assert_eq!(offer.mode, OfferMode::Client);
                assert_eq!(offer.amount, "10000");
            }
            other => panic!("expected inline detection, got {other:?}"),
        }
    }

    #[test]
    fn test_meta_tag_reversed_attribute_order() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<meta content="{}" name="x402-payment">"#,
            signal(OfferMode::Client)
        );
        assert!(matches!(
            detector.detect(200, None, &body),
            Detection::Inline { .. }
        ));
    }

    #[test]
    fn test_script_data_attribute_detected() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<script src="/x402.js" data-x402="{}"></script>"#,
            signal(OfferMode::Server)
        );
        match detector.detect(200, None, &body) {
            Detection::Inline { offer } => assert_eq!(offer.mode, OfferMode::Server),
            other => panic!("expected inline detection, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_init_call_detected() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<script>x402.init("{}");</script>"#,
            signal(OfferMode::Client)
        );
        assert!(matches!(
            detector.detect(200, None, &body),
            Detection::Inline { .. }
        ));
    }

    #[test]
    fn test_three_encodings_normalize_identically() {
        let detector = HtmlSignalDetector;
        let encoded = signal(OfferMode::Client);
        let bodies = [
            format!(r#"<meta name="x402-payment" content="{encoded}">"#),
            format!(r#"<script data-x402="{encoded}"></script>"#),
            format!(r#"<script>x402.init("{encoded}")</script>"#),
        ];
        let offers: Vec<_> = bodies
            .iter()
            .map(|b| match detector.detect(200, None, b) {
                Detection::Inline { offer } => offer,
                other => panic!("expected inline detection, got {other:?}"),
            })
            .collect();
        assert_eq!(offers[0], offers[1]);
        assert_eq!(offers[1], offers[2]);
    }

    #[test]
    fn test_meta_takes_precedence_over_data_attribute() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<meta name="x402-payment" content="{}">
               <script data-x402="{}"></script>"#,
            signal(OfferMode::Client),
            signal(OfferMode::Server),
        );
        match detector.detect(200, None, &body) {
            Detection::Inline { offer } => assert_eq!(offer.mode, OfferMode::Client),
            other => panic!("expected inline detection, got {other:?}"),
        }
    }

    #[test]
    fn test_402_status_wins_over_inline_signal() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<meta name="x402-payment" content="{}">"#,
            signal(OfferMode::Server)
        );
        let header = header_signal();
        match detector.detect(402, Some(&header), &body) {
            Detection::Protocol402 { offer } => assert_eq!(offer.amount, "25000"),
            other => panic!("expected 402 detection, got {other:?}"),
        }
    }

    #[test]
    fn test_402_without_header_passes_through() {
        let detector = HtmlSignalDetector;
        assert_eq!(detector.detect(402, None, "payment required"), Detection::None);
    }

    #[test]
    fn test_malformed_marker_degrades_to_none() {
        let detector = HtmlSignalDetector;
        let body = r#"<meta name="x402-payment" content="bm90IGpzb24=">"#;
        assert_eq!(detector.detect(200, None, body), Detection::None);
    }

    #[test]
    fn test_malformed_meta_falls_back_to_data_attribute() {
        let detector = HtmlSignalDetector;
        let body = format!(
            r#"<meta name="x402-payment" content="bm90IGpzb24=">
               <script data-x402="{}"></script>"#,
            signal(OfferMode::Client)
        );
        assert!(matches!(
            detector.detect(200, None, &body),
            Detection::Inline { .. }
        ));
    }
}
