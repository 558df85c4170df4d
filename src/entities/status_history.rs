//! Status history entity - audit trail of order status changes.
//!
//! One row per change: the previous status (absent for the row written when
//! the order is placed), the new status, when, an optional comment and who
//! made the change.

use super::order::OrderStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status history database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub changed_at: DateTimeUtc,
    pub comment: Option<String>,
    /// Who made the change (admin, customer, `stripe`, ...)
    pub changed_by: Option<String>,
}

/// Defines relationships between StatusHistory and other entities
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
