//! Order status transitions, shipment and delivery.
//!
//! Every change writes a `status_history` row in the same transaction as the
//! status update. Cancelling an order puts its stock back and reopening it
//! reserves the stock again. Customers are emailed after the commit for
//! statuses where [`OrderStatus::is_notifiable`] holds.

use crate::{
    core::{
        notification::OrderMailer,
        order::{OrderDetails, find_order, get_order},
        product::{decrement_stock, increment_stock},
    },
    entities::{OrderLine, OrderStatus, order, order_line, status_history},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

/// Days between shipment and the estimated delivery date.
const ESTIMATED_DELIVERY_DAYS: i64 = 3;

/// A requested status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Shipment details recorded when an order leaves the warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub tracking_number: String,
    pub carrier: String,
    /// Defaults to now
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Delivery confirmation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// Defaults to now
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Cancellation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Moves `order` to `new_status` and appends the matching history row.
///
/// Must run inside the caller's transaction. Moving into `CANCELLED` returns
/// every line's quantity to stock and leaving it takes the quantities again,
/// so an order holds its stock exactly while it is not cancelled.
///
/// # Errors
/// Returns [`Error::InsufficientStock`] when a cancelled order is reopened
/// but a product no longer has enough units, or a database error.
pub(crate) async fn record_status_change<C>(
    db: &C,
    order: order::Model,
    new_status: OrderStatus,
    comment: Option<String>,
    changed_by: Option<String>,
) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let previous = order.status;

    let cancelling = new_status == OrderStatus::Cancelled;
    if cancelling != (previous == OrderStatus::Cancelled) {
        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order.id))
            .all(db)
            .await?;
        for line in lines {
            if cancelling {
                increment_stock(db, line.product_id, line.quantity).await?;
            } else {
                decrement_stock(db, line.product_id, line.quantity).await?;
            }
        }
    }

    status_history::ActiveModel {
        order_id: Set(order.id),
        previous_status: Set(Some(previous)),
        new_status: Set(new_status),
        changed_at: Set(Utc::now()),
        comment: Set(comment),
        changed_by: Set(changed_by),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(new_status);
    active.update(db).await.map_err(Into::into)
}

/// Reloads the order after a committed change and emails the customer when
/// the new status warrants it.
async fn finish_change(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
    previous: OrderStatus,
    new_status: OrderStatus,
) -> Result<OrderDetails> {
    let details = get_order(db, order_id).await?;
    if new_status.is_notifiable() {
        mailer
            .send_status_update(&details, Some(previous), new_status)
            .await;
    }
    Ok(details)
}

/// Sets an order's status.
///
/// Any status may follow any other; the change is recorded in the history.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] or a database error. Notification
/// failures are only logged.
#[instrument(skip(db, mailer))]
pub async fn update_status(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
    change: StatusChange,
) -> Result<OrderDetails> {
    let txn = db.begin().await?;

    let order = find_order(&txn, order_id).await?;
    let previous = order.status;
    record_status_change(&txn, order, change.status, change.comment, change.changed_by).await?;

    txn.commit().await?;

    info!(order_id, from = %previous, to = %change.status, "Order status changed");
    finish_change(db, mailer, order_id, previous, change.status).await
}

/// Records the shipment and moves the order to `SHIPPED`.
///
/// The estimated delivery is three days after `shipped_at`.
///
/// # Errors
/// Returns a validation error for a blank tracking number or carrier,
/// [`Error::OrderNotFound`], or a database error.
#[instrument(skip(db, mailer, shipment))]
pub async fn ship_order(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
    shipment: Shipment,
) -> Result<OrderDetails> {
    let tracking_number = shipment.tracking_number.trim().to_string();
    let carrier = shipment.carrier.trim().to_string();
    if tracking_number.is_empty() {
        return Err(Error::validation("Tracking number cannot be empty"));
    }
    if carrier.is_empty() {
        return Err(Error::validation("Carrier cannot be empty"));
    }

    let shipped_at = shipment.shipped_at.unwrap_or_else(Utc::now);
    let comment = format!("Commande expédiée avec numéro de suivi: {tracking_number}");

    let txn = db.begin().await?;

    let order = find_order(&txn, order_id).await?;
    let previous = order.status;

    let mut active: order::ActiveModel = order.into();
    active.tracking_number = Set(Some(tracking_number.clone()));
    active.carrier = Set(Some(carrier.clone()));
    active.shipped_at = Set(Some(shipped_at));
    active.estimated_delivery_at = Set(Some(shipped_at + Duration::days(ESTIMATED_DELIVERY_DAYS)));
    if let Some(notes) = shipment.notes {
        active.delivery_notes = Set(Some(notes));
    }
    let order = active.update(&txn).await?;

    record_status_change(
        &txn,
        order,
        OrderStatus::Shipped,
        Some(comment),
        shipment.changed_by,
    )
    .await?;

    txn.commit().await?;

    info!(order_id, tracking_number = %tracking_number, carrier = %carrier, "Order shipped");
    finish_change(db, mailer, order_id, previous, OrderStatus::Shipped).await
}

/// Records delivery and moves the order to `DELIVERED`.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] or a database error.
#[instrument(skip(db, mailer))]
pub async fn mark_delivered(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
    delivery: Delivery,
) -> Result<OrderDetails> {
    let delivered_at = delivery.delivered_at.unwrap_or_else(Utc::now);

    let txn = db.begin().await?;

    let order = find_order(&txn, order_id).await?;
    let previous = order.status;

    let mut active: order::ActiveModel = order.into();
    active.delivered_at = Set(Some(delivered_at));
    let order = active.update(&txn).await?;

    record_status_change(
        &txn,
        order,
        OrderStatus::Delivered,
        Some(format!(
            "Commande livrée le {}",
            delivered_at.format("%Y-%m-%d")
        )),
        delivery.changed_by,
    )
    .await?;

    txn.commit().await?;

    info!(order_id, "Order delivered");
    finish_change(db, mailer, order_id, previous, OrderStatus::Delivered).await
}

/// Cancels an order and returns its stock.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] or a database error.
#[instrument(skip(db, mailer))]
pub async fn cancel_order(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
    cancellation: Cancellation,
) -> Result<OrderDetails> {
    let comment = cancellation
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Commande annulée".to_string());

    update_status(
        db,
        mailer,
        order_id,
        StatusChange {
            status: OrderStatus::Cancelled,
            comment: Some(comment),
            changed_by: cancellation.changed_by,
        },
    )
    .await
}
