//! Order entity - a customer order with its shipment tracking fields.
//!
//! The `status` column records where the order is in its lifecycle
//! (`EN_ATTENTE` → `PAYEE` → `SHIPPED` → `DELIVERED`, or `CANCELLED`).
//! Every change is also appended to `status_history`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an order. Stored and serialized with the store's wire values.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    /// Placed, waiting for payment
    #[sea_orm(string_value = "EN_ATTENTE")]
    #[serde(rename = "EN_ATTENTE")]
    Pending,
    /// Payment captured
    #[sea_orm(string_value = "PAYEE")]
    #[serde(rename = "PAYEE")]
    Paid,
    #[sea_orm(string_value = "CONFIRMED")]
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "PROCESSING")]
    #[serde(rename = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "SHIPPED")]
    #[serde(rename = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    #[serde(rename = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    /// Wire/database value of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "EN_ATTENTE",
            Self::Paid => "PAYEE",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether moving into this status sends the customer an email.
    #[must_use]
    pub const fn is_notifiable(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Shipped | Self::Delivered | Self::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Client who placed the order
    pub client_id: i64,
    /// When the order was placed
    pub ordered_at: DateTimeUtc,
    /// Sum of the order lines
    pub total: f64,
    pub status: OrderStatus,
    /// Carrier tracking number, set when shipped
    pub tracking_number: Option<String>,
    /// Shipping carrier, e.g. "DHL" or "UPS"
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTimeUtc>,
    pub estimated_delivery_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    pub delivery_notes: Option<String>,
    /// Address this order ships to (a copy owned by the order)
    pub shipping_address_id: Option<i64>,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::ShippingAddressId",
        to = "super::address::Column::Id",
        on_delete = "SetNull"
    )]
    ShippingAddress,
    #[sea_orm(has_many = "super::order_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::status_history::Entity")]
    History,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_status_wire_values_round_trip_through_serde() {
        let json = serde_json::to_string(&OrderStatus::Pending).unwrap_or_default();
        assert_eq!(json, "\"EN_ATTENTE\"");

        let parsed: OrderStatus = serde_json::from_str("\"SHIPPED\"").unwrap_or(OrderStatus::Pending);
        assert_eq!(parsed, OrderStatus::Shipped);
        assert_eq!(parsed.to_string(), "SHIPPED");
    }

    #[test]
    fn test_notifiable_statuses() {
        let notifiable: Vec<OrderStatus> = OrderStatus::iter()
            .filter(|s| s.is_notifiable())
            .collect();
        assert_eq!(
            notifiable,
            vec![
                OrderStatus::Confirmed,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ]
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<OrderStatus>("\"LOST\"").is_err());
    }
}
