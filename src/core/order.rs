//! Order business logic - placing orders and reading them back.
//!
//! Placing an order is one transaction: stock is taken for every line, the
//! shipping address is copied, and the first history row is written. If any
//! line fails, nothing is kept.

use crate::{
    core::{
        client::{AddressInput, insert_address},
        notification::OrderMailer,
        product::decrement_stock,
    },
    entities::{
        Address, Client, Order, OrderLine, OrderStatus, Payment, Product, StatusHistory, address,
        order, order_line, payment, status_history,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Largest accepted gap between a client-computed total and the server's.
const TOTAL_TOLERANCE: f64 = 0.01;

/// One requested line of a new order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i32,
    /// Price the storefront showed; defaults to the product's current price
    #[serde(default)]
    pub unit_price: Option<f64>,
}

/// Payload for placing an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub client_id: i64,
    pub lines: Vec<NewOrderLine>,
    /// Total computed by the storefront, checked against the lines
    #[serde(default)]
    pub total: Option<f64>,
    /// Ship somewhere other than the client's address
    #[serde(default)]
    pub shipping_address: Option<AddressInput>,
    #[serde(default)]
    pub delivery_notes: Option<String>,
}

/// Who placed an order, as embedded in order views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// An order line with the product's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineDetails {
    #[serde(flatten)]
    pub line: order_line::Model,
    pub product_name: String,
    pub line_total: f64,
}

/// Order header as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: order::Model,
    pub client: Option<ClientSummary>,
    pub shipping_address: Option<address::Model>,
}

/// Everything known about one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub client: Option<ClientSummary>,
    pub shipping_address: Option<address::Model>,
    pub lines: Vec<OrderLineDetails>,
    pub payment: Option<payment::Model>,
}

/// Shipment tracking view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub order_id: i64,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivery_notes: Option<String>,
}

impl From<order::Model> for TrackingInfo {
    fn from(order: order::Model) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            shipped_at: order.shipped_at,
            estimated_delivery_at: order.estimated_delivery_at,
            delivered_at: order.delivered_at,
            delivery_notes: order.delivery_notes,
        }
    }
}

impl From<crate::entities::client::Model> for ClientSummary {
    fn from(client: crate::entities::client::Model) -> Self {
        Self {
            id: client.id,
            name: client.name,
            email: client.email,
            phone: client.phone,
        }
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn validate_new_order(input: &NewOrder) -> Result<()> {
    if input.lines.is_empty() {
        return Err(Error::validation("An order needs at least one line"));
    }
    for line in &input.lines {
        if line.quantity <= 0 {
            return Err(Error::validation(format!(
                "Quantity must be positive for product {}: {}",
                line.product_id, line.quantity
            )));
        }
        if let Some(price) = line.unit_price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::InvalidAmount { amount: price });
            }
        }
    }
    if let Some(total) = input.total {
        if !total.is_finite() || total < 0.0 {
            return Err(Error::InvalidAmount { amount: total });
        }
    }
    Ok(())
}

/// Places an order: validates lines, takes stock, stores lines and the first
/// history row, all in one transaction.
///
/// # Errors
/// Returns an error if:
/// - There are no lines, or a quantity/price is invalid
/// - The client or a product does not exist
/// - A product does not have enough stock
/// - The given total differs from the computed one by more than a cent
/// - Any database operation fails
#[instrument(skip(db, input), fields(client_id = input.client_id))]
pub async fn create_order(db: &DatabaseConnection, input: NewOrder) -> Result<OrderDetails> {
    validate_new_order(&input)?;

    let txn = db.begin().await?;

    let client = Client::find_by_id(input.client_id)
        .one(&txn)
        .await?
        .ok_or(Error::ClientNotFound {
            id: input.client_id,
        })?;

    let mut priced = Vec::with_capacity(input.lines.len());
    let mut total = 0.0;
    for line in &input.lines {
        let product = Product::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or(Error::ProductNotFound {
                id: line.product_id,
            })?;
        let unit_price = line.unit_price.unwrap_or_else(|| product.effective_price());

        decrement_stock(&txn, product.id, line.quantity).await?;

        total += f64::from(line.quantity) * unit_price;
        priced.push((product.id, line.quantity, unit_price));
    }
    let total = round_cents(total);

    if let Some(claimed) = input.total {
        if (claimed - total).abs() > TOTAL_TOLERANCE {
            return Err(Error::validation(format!(
                "Order total {claimed:.2} does not match its lines ({total:.2})"
            )));
        }
    }

    let shipping_address_id = match &input.shipping_address {
        Some(fields) => Some(insert_address(&txn, fields).await?.id),
        None => match client.address_id {
            Some(address_id) => match Address::find_by_id(address_id).one(&txn).await? {
                Some(existing) => Some(
                    insert_address(
                        &txn,
                        &AddressInput {
                            street: existing.street,
                            city: existing.city,
                            postal_code: existing.postal_code,
                            country: existing.country,
                        },
                    )
                    .await?
                    .id,
                ),
                None => None,
            },
            None => None,
        },
    };

    let now = Utc::now();
    let order = order::ActiveModel {
        client_id: Set(client.id),
        ordered_at: Set(now),
        total: Set(total),
        status: Set(OrderStatus::Pending),
        tracking_number: Set(None),
        carrier: Set(None),
        shipped_at: Set(None),
        estimated_delivery_at: Set(None),
        delivered_at: Set(None),
        delivery_notes: Set(input.delivery_notes),
        shipping_address_id: Set(shipping_address_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (product_id, quantity, unit_price) in priced {
        order_line::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    status_history::ActiveModel {
        order_id: Set(order.id),
        previous_status: Set(None),
        new_status: Set(OrderStatus::Pending),
        changed_at: Set(now),
        comment: Set(Some("Commande créée".to_string())),
        changed_by: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(order_id = order.id, client_id = client.id, total, "Placed order");
    load_order_details(db, order).await
}

/// Loads client, address, lines and payment for an order.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn load_order_details<C>(db: &C, order: order::Model) -> Result<OrderDetails>
where
    C: ConnectionTrait,
{
    let client = Client::find_by_id(order.client_id)
        .one(db)
        .await?
        .map(ClientSummary::from);

    let shipping_address = match order.shipping_address_id {
        Some(address_id) => Address::find_by_id(address_id).one(db).await?,
        None => None,
    };

    let lines = OrderLine::find()
        .filter(order_line::Column::OrderId.eq(order.id))
        .find_also_related(Product)
        .order_by_asc(order_line::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|(line, product)| OrderLineDetails {
            product_name: product.map(|p| p.name).unwrap_or_default(),
            line_total: round_cents(line.line_total()),
            line,
        })
        .collect();

    let payment = Payment::find()
        .filter(payment::Column::OrderId.eq(order.id))
        .one(db)
        .await?;

    Ok(OrderDetails {
        order,
        client,
        shipping_address,
        lines,
        payment,
    })
}

/// Finds an order row or fails with [`Error::OrderNotFound`].
///
/// # Errors
/// Returns [`Error::OrderNotFound`] or a database error.
pub async fn find_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound { id: order_id })
}

/// Retrieves one order with its lines and payment.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] if there is no such order.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<OrderDetails> {
    let order = find_order(db, order_id).await?;
    load_order_details(db, order).await
}

async fn summarize(db: &DatabaseConnection, rows: Vec<order::Model>) -> Result<Vec<OrderSummary>> {
    let client_ids: Vec<i64> = rows.iter().map(|o| o.client_id).collect();
    let address_ids: Vec<i64> = rows.iter().filter_map(|o| o.shipping_address_id).collect();

    let clients: HashMap<i64, ClientSummary> = Client::find()
        .filter(crate::entities::client::Column::Id.is_in(client_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, ClientSummary::from(c)))
        .collect();
    let mut addresses: HashMap<i64, address::Model> = Address::find()
        .filter(address::Column::Id.is_in(address_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(rows
        .into_iter()
        .map(|order| OrderSummary {
            client: clients.get(&order.client_id).cloned(),
            shipping_address: order
                .shipping_address_id
                .and_then(|id| addresses.remove(&id)),
            order,
        })
        .collect())
}

/// Lists every order, oldest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_orders(db: &DatabaseConnection) -> Result<Vec<OrderSummary>> {
    let rows = Order::find()
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?;
    summarize(db, rows).await
}

/// Lists a client's orders, newest first.
///
/// # Errors
/// Returns [`Error::ClientNotFound`] if there is no such client.
pub async fn list_orders_for_client(
    db: &DatabaseConnection,
    client_id: i64,
) -> Result<Vec<OrderSummary>> {
    Client::find_by_id(client_id)
        .one(db)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })?;

    let rows = Order::find()
        .filter(order::Column::ClientId.eq(client_id))
        .order_by_desc(order::Column::OrderedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;
    summarize(db, rows).await
}

/// Shipment tracking for an order.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] if there is no such order.
pub async fn get_tracking(db: &DatabaseConnection, order_id: i64) -> Result<TrackingInfo> {
    find_order(db, order_id).await.map(TrackingInfo::from)
}

/// Status changes of an order, newest first.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] if there is no such order.
pub async fn status_history(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<status_history::Model>> {
    find_order(db, order_id).await?;

    StatusHistory::find()
        .filter(status_history::Column::OrderId.eq(order_id))
        .order_by_desc(status_history::Column::ChangedAt)
        .order_by_desc(status_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sends (again) the order confirmation email.
///
/// Returns the order and whether the email went out; delivery problems are
/// logged, never returned.
///
/// # Errors
/// Returns [`Error::OrderNotFound`] if there is no such order.
#[instrument(skip(db, mailer))]
pub async fn send_confirmation(
    db: &DatabaseConnection,
    mailer: &OrderMailer,
    order_id: i64,
) -> Result<(OrderDetails, bool)> {
    let details = get_order(db, order_id).await?;
    let sent = mailer.send_confirmation(&details).await;
    Ok((details, sent))
}
