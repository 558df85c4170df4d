//! Payment entity - the single payment attached to an order.
//!
//! `reference` holds the Stripe PaymentIntent or Checkout session id for a
//! successful payment, and `ERROR: <message>` for a failed one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a payment attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "SUCCES")]
    #[serde(rename = "SUCCES")]
    Success,
    #[sea_orm(string_value = "ECHEC")]
    #[serde(rename = "ECHEC")]
    Failed,
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Transaction id
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Paid order; an order has at most one payment row
    #[sea_orm(unique)]
    pub order_id: i64,
    pub status: PaymentStatus,
    pub amount: f64,
    /// Payment method label, e.g. `CARTE_BANCAIRE`
    pub method: String,
    pub reference: Option<String>,
    pub paid_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
