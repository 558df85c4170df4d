//! Payment business logic - direct Stripe charges and Checkout sessions.
//!
//! An order has at most one payment row. A failed attempt is stored as `ECHEC`
//! and reused by the next attempt; once a payment is `SUCCES` the order cannot
//! be charged again. A successful payment moves the order to `PAYEE`.

use crate::{
    core::{
        order::{find_order, get_order},
        status::record_status_change,
    },
    entities::{OrderStatus, Payment, PaymentStatus, payment},
    errors::{Error, Result},
    gateway::{
        ChargeRequest, CheckoutLineItem, CheckoutRequest, CheckoutSession, PaymentGateway,
        from_cents, to_cents,
    },
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Method recorded for card payments.
pub const CARD_METHOD: &str = "CARTE_BANCAIRE";

/// Who the status history credits for payment-driven changes.
const GATEWAY_ACTOR: &str = "stripe";

/// Direct charge request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub method: Option<String>,
}

/// Checkout session request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    pub order_id: i64,
    pub success_url: String,
    pub cancel_url: String,
    /// Overrides the configured currency
    #[serde(default)]
    pub currency: Option<String>,
}

/// Result of confirming a paid checkout session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfirmation {
    pub order_id: i64,
    pub session_id: String,
    pub amount: f64,
    pub payment: payment::Model,
}

/// Inserts a payment row, or overwrites the order's failed one.
async fn save_payment<C>(
    db: &C,
    existing: Option<payment::Model>,
    order_id: i64,
    status: PaymentStatus,
    amount: f64,
    method: String,
    reference: Option<String>,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    match existing {
        Some(previous) => {
            let mut active: payment::ActiveModel = previous.into();
            active.status = Set(status);
            active.amount = Set(amount);
            active.method = Set(method);
            active.reference = Set(reference);
            active.paid_at = Set(now);
            active.update(db).await.map_err(Into::into)
        }
        None => payment::ActiveModel {
            order_id: Set(order_id),
            status: Set(status),
            amount: Set(amount),
            method: Set(method),
            reference: Set(reference),
            paid_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Into::into),
    }
}

async fn payment_for_order<C>(db: &C, order_id: i64) -> Result<Option<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Stores a successful payment and marks the order `PAYEE`, atomically.
async fn settle(
    db: &DatabaseConnection,
    order_id: i64,
    amount: f64,
    reference: String,
    method: String,
    comment: String,
) -> Result<payment::Model> {
    let txn = db.begin().await?;

    let order = find_order(&txn, order_id).await?;
    let existing = payment_for_order(&txn, order_id).await?;
    if existing
        .as_ref()
        .is_some_and(|p| p.status == PaymentStatus::Success)
    {
        return Err(Error::PaymentAlreadyExists { order_id });
    }
    let payment = save_payment(
        &txn,
        existing,
        order_id,
        PaymentStatus::Success,
        amount,
        method,
        Some(reference),
    )
    .await?;

    if order.status != OrderStatus::Paid {
        record_status_change(
            &txn,
            order,
            OrderStatus::Paid,
            Some(comment),
            Some(GATEWAY_ACTOR.to_string()),
        )
        .await?;
    }

    txn.commit().await?;
    Ok(payment)
}

/// Charges an order through the gateway.
///
/// # Errors
/// Returns an error if:
/// - The amount is not finite or not positive
/// - The order does not exist or is already paid
/// - The gateway refuses the charge ([`Error::PaymentFailed`]; the failed
///   attempt is stored first)
/// - A database operation fails
#[instrument(skip(db, gateway))]
pub async fn pay_order(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    currency: &str,
    request: PaymentRequest,
) -> Result<payment::Model> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: request.amount,
        });
    }

    let order = find_order(db, request.order_id).await?;
    let existing = payment_for_order(db, order.id).await?;
    if existing
        .as_ref()
        .is_some_and(|p| p.status == PaymentStatus::Success)
    {
        return Err(Error::PaymentAlreadyExists { order_id: order.id });
    }

    let method = request
        .method
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| CARD_METHOD.to_string());

    let charge = gateway
        .charge(&ChargeRequest {
            amount_cents: to_cents(request.amount),
            currency: currency.to_string(),
            description: format!("Paiement commande #{}", order.id),
        })
        .await;

    match charge {
        Ok(charge) => {
            let payment = settle(
                db,
                order.id,
                request.amount,
                charge.id.clone(),
                method,
                format!("Paiement Stripe {}", charge.id),
            )
            .await?;
            info!(order_id = order.id, payment_id = payment.id, reference = %charge.id, "Order paid");
            Ok(payment)
        }
        Err(e) => {
            let message = e.to_string();
            save_payment(
                db,
                existing,
                order.id,
                PaymentStatus::Failed,
                request.amount,
                method,
                Some(format!("ERROR: {message}")),
            )
            .await?;
            warn!(order_id = order.id, error = %message, "Payment failed");
            Err(Error::PaymentFailed { message })
        }
    }
}

/// Retrieves a payment by id.
///
/// # Errors
/// Returns [`Error::PaymentNotFound`] if there is no such payment.
pub async fn get_payment(db: &DatabaseConnection, payment_id: i64) -> Result<payment::Model> {
    Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(Error::PaymentNotFound { id: payment_id })
}

/// Opens a hosted Checkout session for an order's lines.
///
/// # Errors
/// Returns an error if the URLs are blank, the order does not exist, has no
/// lines or is already paid, or the gateway call fails.
#[instrument(skip(db, gateway, input), fields(order_id = input.order_id))]
pub async fn create_checkout_session(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    default_currency: &str,
    input: CheckoutInput,
) -> Result<CheckoutSession> {
    if input.success_url.trim().is_empty() || input.cancel_url.trim().is_empty() {
        return Err(Error::validation(
            "Checkout needs both a success and a cancel URL",
        ));
    }

    let details = get_order(db, input.order_id).await?;
    if details.lines.is_empty() {
        return Err(Error::validation(format!(
            "Order {} has no lines to pay",
            input.order_id
        )));
    }
    if details
        .payment
        .as_ref()
        .is_some_and(|p| p.status == PaymentStatus::Success)
    {
        return Err(Error::PaymentAlreadyExists {
            order_id: input.order_id,
        });
    }

    let request = CheckoutRequest {
        client_reference_id: details.order.id.to_string(),
        currency: input
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| default_currency.to_string())
            .to_lowercase(),
        success_url: input.success_url,
        cancel_url: input.cancel_url,
        line_items: details
            .lines
            .iter()
            .map(|l| CheckoutLineItem {
                name: l.product_name.clone(),
                description: format!("Quantité: {}", l.line.quantity),
                unit_amount_cents: to_cents(l.line.unit_price),
                quantity: i64::from(l.line.quantity),
            })
            .collect(),
    };

    let session = gateway.create_checkout_session(&request).await?;
    info!(order_id = details.order.id, session_id = %session.id, "Checkout session created");
    Ok(session)
}

/// Confirms a Checkout session after the customer was redirected back.
///
/// Confirming the same session twice returns the stored payment.
///
/// # Errors
/// Returns a validation error for a malformed session id,
/// [`Error::PaymentNotConfirmed`] if the session is not paid,
/// [`Error::OrderNotFound`] if the session names an unknown order,
/// [`Error::PaymentAlreadyExists`] if the order was paid by other means, or a
/// gateway/database error.
#[instrument(skip(db, gateway))]
pub async fn confirm_checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    session_id: &str,
) -> Result<CheckoutConfirmation> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(Error::validation("Missing checkout session id"));
    }
    // The id becomes a path segment of the Stripe API URL
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::validation(format!(
            "Invalid checkout session id: {session_id}"
        )));
    }

    let session = gateway.retrieve_checkout_session(session_id).await?;
    if !session.is_paid() {
        return Err(Error::PaymentNotConfirmed {
            session_id: session_id.to_string(),
        });
    }

    let order_id = session
        .client_reference_id
        .as_deref()
        .and_then(|r| r.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::validation(format!(
                "Checkout session {session_id} does not reference an order"
            ))
        })?;
    let amount = from_cents(session.amount_total.unwrap_or_default());

    if let Some(existing) = payment_for_order(db, order_id).await? {
        if existing.status == PaymentStatus::Success {
            if existing.reference.as_deref() == Some(session_id) {
                return Ok(CheckoutConfirmation {
                    order_id,
                    session_id: session_id.to_string(),
                    amount: existing.amount,
                    payment: existing,
                });
            }
            return Err(Error::PaymentAlreadyExists { order_id });
        }
    }

    let payment = settle(
        db,
        order_id,
        amount,
        session_id.to_string(),
        CARD_METHOD.to_string(),
        format!("Paiement Stripe Checkout {session_id}"),
    )
    .await?;

    info!(order_id, session_id, amount, "Checkout confirmed");
    Ok(CheckoutConfirmation {
        order_id,
        session_id: session_id.to_string(),
        amount,
        payment,
    })
}
