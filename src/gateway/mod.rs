//! Payment gateway seam.
//!
//! Business logic talks to [`PaymentGateway`]; production wires in
//! [`StripeClient`], tests wire in a scripted double.

pub mod stripe;

pub use stripe::StripeClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered with an error body (declined card, bad parameters, ...)
    #[error("{message}")]
    Api {
        /// HTTP status returned by the gateway
        status: u16,
        /// Gateway-provided message
        message: String,
    },

    /// A charge came back in a state other than succeeded
    #[error("payment intent {id} ended in status {status}")]
    NotSucceeded {
        /// PaymentIntent id
        id: String,
        /// Final PaymentIntent status
        status: String,
    },

    /// Transport failure or undecodable response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A direct server-side charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in the smallest currency unit (cents)
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Charge {
    /// Gateway reference (Stripe PaymentIntent id)
    pub id: String,
    pub status: String,
}

/// One line of a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: String,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

/// Parameters of a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Our order id, echoed back by the gateway when the session is retrieved
    pub client_reference_id: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<CheckoutLineItem>,
}

/// A hosted checkout session as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page URL (absent once the session has completed)
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: String,
    pub client_reference_id: Option<String>,
    /// Total in cents
    pub amount_total: Option<i64>,
}

impl CheckoutSession {
    /// Whether the customer completed the payment.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Operations the storefront needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates and confirms a charge.
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError>;

    /// Opens a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Looks up a checkout session by id.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError>;
}

/// Converts an amount to cents, rounding to the nearest cent.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Converts cents back to an amount.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_to_cents_rounds_instead_of_truncating() {
        // 119.98 * 100 is 11997.999... in binary floating point
        assert_eq!(to_cents(119.98), 11998);
        assert_eq!(to_cents(59.99), 5999);
        assert_eq!(to_cents(0.0), 0);
    }

    #[test]
    fn test_from_cents() {
        assert_eq!(from_cents(11998), 119.98);
        assert_eq!(from_cents(5), 0.05);
    }

    #[test]
    fn test_session_paid() {
        let mut session = CheckoutSession {
            id: "cs_test_1".to_string(),
            url: None,
            payment_status: "unpaid".to_string(),
            client_reference_id: Some("4".to_string()),
            amount_total: Some(1000),
        };
        assert!(!session.is_paid());
        session.payment_status = "paid".to_string();
        assert!(session.is_paid());
    }
}
