//! Shared test utilities for the storefront.
//!
//! This module provides helpers for setting up test databases, creating
//! entities with sensible defaults, and in-memory doubles for the payment
//! gateway and the email transport.

#![allow(clippy::unwrap_used)]

use crate::{
    config::settings::EmailSettings,
    core::{
        client::{self, AddressInput, ClientDetails, ClientInput},
        notification::{EmailMessage, Notifier, OrderMailer},
        order::{self, NewOrder, NewOrderLine, OrderDetails},
        product::{self, ProductInput},
    },
    entities,
    errors::{Error, Result},
    gateway::{
        Charge, ChargeRequest, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
    },
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Mutex};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Address used by [`create_test_client`].
pub fn test_address() -> AddressInput {
    AddressInput {
        street: Some("12 avenue Habib Bourguiba".to_string()),
        city: Some("Tunis".to_string()),
        postal_code: Some("1000".to_string()),
        country: Some("Tunisie".to_string()),
    }
}

/// Creates a test client with an address.
///
/// # Defaults
/// * email: derived from the name, `@example.com`
/// * phone: "+216 71 000 000"
/// * address: [`test_address`]
pub async fn create_test_client(db: &DatabaseConnection, name: &str) -> Result<ClientDetails> {
    let local: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    client::create_client(
        db,
        ClientInput {
            name: name.to_string(),
            email: format!("{local}@example.com"),
            phone: Some("+216 71 000 000".to_string()),
            address: Some(test_address()),
        },
    )
    .await
}

/// Creates a test product in the "Informatique" category.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    stock: i32,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        ProductInput {
            name: name.to_string(),
            category: "Informatique".to_string(),
            price,
            stock,
            ..ProductInput::default()
        },
    )
    .await
}

/// Places an order at current prices for `(product_id, quantity)` pairs.
pub async fn create_test_order(
    db: &DatabaseConnection,
    client_id: i64,
    lines: &[(i64, i32)],
) -> Result<OrderDetails> {
    order::create_order(
        db,
        NewOrder {
            client_id,
            lines: lines
                .iter()
                .map(|&(product_id, quantity)| NewOrderLine {
                    product_id,
                    quantity,
                    unit_price: None,
                })
                .collect(),
            total: None,
            shipping_address: None,
            delivery_notes: None,
        },
    )
    .await
}

/// Sets up a database with one client, one product (25.00, stock 10) and one
/// pending order for two units of it (total 50.00, stock left 8).
pub async fn setup_with_order() -> Result<(
    DatabaseConnection,
    ClientDetails,
    entities::product::Model,
    OrderDetails,
)> {
    let db = setup_test_db().await?;
    let client = create_test_client(&db, "Amel Ben Ali").await?;
    let product = create_test_product(&db, "Test Keyboard", 25.0, 10).await?;
    let order = create_test_order(&db, client.client.id, &[(product.id, 2)]).await?;
    Ok((db, client, product, order))
}

/// A paid checkout session for `order_id`.
pub fn paid_session(id: &str, order_id: i64, amount_cents: i64) -> CheckoutSession {
    CheckoutSession {
        id: id.to_string(),
        url: None,
        payment_status: "paid".to_string(),
        client_reference_id: Some(order_id.to_string()),
        amount_total: Some(amount_cents),
    }
}

/// In-memory [`PaymentGateway`] that records every request.
#[derive(Default)]
pub struct MockGateway {
    decline: Option<String>,
    session: Option<CheckoutSession>,
    charges: Mutex<Vec<ChargeRequest>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
}

impl MockGateway {
    /// A gateway that refuses every charge with `message`.
    pub fn declining(message: &str) -> Self {
        Self {
            decline: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// A gateway whose session lookups return `session`.
    pub fn with_session(session: CheckoutSession) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(&self, request: &ChargeRequest) -> std::result::Result<Charge, GatewayError> {
        let mut charges = self.charges.lock().unwrap();
        charges.push(request.clone());
        if let Some(message) = &self.decline {
            return Err(GatewayError::Api {
                status: 402,
                message: message.clone(),
            });
        }
        Ok(Charge {
            id: format!("pi_test_{}", charges.len()),
            status: "succeeded".to_string(),
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> std::result::Result<CheckoutSession, GatewayError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        let id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
            id,
            payment_status: "unpaid".to_string(),
            client_reference_id: Some(request.client_reference_id.clone()),
            amount_total: Some(
                request
                    .line_items
                    .iter()
                    .map(|l| l.unit_amount_cents * l.quantity)
                    .sum(),
            ),
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> std::result::Result<CheckoutSession, GatewayError> {
        self.session
            .clone()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                message: format!("No such checkout.session: '{session_id}'"),
            })
    }
}

/// [`Notifier`] that keeps messages in memory, or fails every send.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        if self.fail {
            return Err(Error::Io(std::io::Error::other("smtp unavailable")));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// A mailer with default email settings backed by a [`RecordingNotifier`].
pub fn test_mailer() -> (OrderMailer, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    (
        OrderMailer::new(notifier.clone(), EmailSettings::default()),
        notifier,
    )
}

/// A mailer whose every send fails.
pub fn failing_mailer() -> (OrderMailer, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    });
    (
        OrderMailer::new(notifier.clone(), EmailSettings::default()),
        notifier,
    )
}
