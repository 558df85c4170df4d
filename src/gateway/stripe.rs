//! Stripe REST client.
//!
//! Talks to the Stripe API directly over `reqwest`: bearer authentication with
//! the secret key and form-encoded parameters, using bracket notation for
//! nested fields (`line_items[0][price_data][currency]`).

use super::{
    Charge, ChargeRequest, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
};
use crate::config::settings::StripeSettings;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
    payment_method: String,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    /// Builds a client for the given secret key.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(secret_key: impl Into<String>, settings: &StripeSettings) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            secret_key: secret_key.into(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            payment_method: settings.payment_method.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.bearer_auth(&self.secret_key).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| format!("Stripe returned HTTP {}", status.as_u16()));
        warn!(status = status.as_u16(), %message, "Stripe request failed");

        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self))]
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let form = payment_intent_form(request, &self.payment_method);
        let charge: Charge = self
            .send(self.http.post(self.endpoint("/v1/payment_intents")).form(&form))
            .await?;

        debug!(id = %charge.id, status = %charge.status, "PaymentIntent confirmed");
        if charge.status != "succeeded" {
            return Err(GatewayError::NotSucceeded {
                id: charge.id,
                status: charge.status,
            });
        }
        Ok(charge)
    }

    #[instrument(skip(self, request), fields(order = %request.client_reference_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let form = checkout_form(request);
        self.send(self.http.post(self.endpoint("/v1/checkout/sessions")).form(&form))
            .await
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let path = format!("/v1/checkout/sessions/{session_id}");
        self.send(self.http.get(self.endpoint(&path))).await
    }
}

/// Form parameters of a PaymentIntent created and confirmed in one call.
pub(crate) fn payment_intent_form(
    request: &ChargeRequest,
    payment_method: &str,
) -> Vec<(String, String)> {
    vec![
        ("amount".to_string(), request.amount_cents.to_string()),
        ("currency".to_string(), request.currency.to_lowercase()),
        ("description".to_string(), request.description.clone()),
        ("payment_method".to_string(), payment_method.to_string()),
        ("confirm".to_string(), "true".to_string()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
        (
            "automatic_payment_methods[allow_redirects]".to_string(),
            "never".to_string(),
        ),
    ]
}

/// Form parameters of a card-only checkout session in payment mode.
pub(crate) fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
        ("payment_method_types[0]".to_string(), "card".to_string()),
    ];

    let currency = request.currency.to_lowercase();
    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount_cents.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][description]"),
            item.description.clone(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    form
}

/// Extracts `error.message` from a Stripe error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CheckoutLineItem;

    fn find<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_payment_intent_form() {
        let request = ChargeRequest {
            amount_cents: 11998,
            currency: "USD".to_string(),
            description: "Paiement commande #5".to_string(),
        };
        let form = payment_intent_form(&request, "pm_card_visa");

        assert_eq!(find(&form, "amount"), Some("11998"));
        assert_eq!(find(&form, "currency"), Some("usd"));
        assert_eq!(find(&form, "description"), Some("Paiement commande #5"));
        assert_eq!(find(&form, "payment_method"), Some("pm_card_visa"));
        assert_eq!(find(&form, "confirm"), Some("true"));
    }

    #[test]
    fn test_checkout_form_has_one_entry_per_line() {
        let request = CheckoutRequest {
            client_reference_id: "12".to_string(),
            currency: "EUR".to_string(),
            success_url: "http://localhost:3000/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:3000/cart".to_string(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Clavier".to_string(),
                    description: "Quantité: 2".to_string(),
                    unit_amount_cents: 5999,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Souris".to_string(),
                    description: "Quantité: 1".to_string(),
                    unit_amount_cents: 2500,
                    quantity: 1,
                },
            ],
        };
        let form = checkout_form(&request);

        assert_eq!(find(&form, "mode"), Some("payment"));
        assert_eq!(find(&form, "client_reference_id"), Some("12"));
        assert_eq!(find(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(
            find(&form, "line_items[0][price_data][product_data][name]"),
            Some("Clavier")
        );
        assert_eq!(find(&form, "line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(find(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            find(&form, "line_items[1][price_data][unit_amount]"),
            Some("2500")
        );
        assert_eq!(find(&form, "line_items[2][quantity]"), None);
    }

    #[test]
    fn test_error_message_from_stripe_body() {
        let body = r#"{"error":{"type":"card_error","message":"Your card was declined."}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Your card was declined.")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let settings = StripeSettings {
            api_base: "http://localhost:12111/".to_string(),
            ..StripeSettings::default()
        };
        let client = StripeClient::new("sk_test_xxx", &settings);
        assert!(client.is_ok());
        if let Ok(client) = client {
            assert_eq!(
                client.endpoint("/v1/payment_intents"),
                "http://localhost:12111/v1/payment_intents"
            );
        }
    }
}
