//! Product entity - an item of the catalog.
//!
//! Products carry a list price, a stock level and optional sale fields. When a
//! discount is applied, `sale_price` holds the reduced price and `discount` the
//! percentage that produced it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Clavier mécanique")
    pub name: String,
    /// Catalog category used by the storefront navigation
    pub category: String,
    /// List price
    pub price: f64,
    /// Units available for sale
    pub stock: i32,
    /// Public path of the product image, e.g. `/uploads/1700000000000_kb.png`
    pub image_url: Option<String>,
    /// Free-form description, at most 1000 characters
    pub description: Option<String>,
    /// Price after discount, if the product is on sale
    pub sale_price: Option<f64>,
    /// Discount percentage, if the product is on sale
    pub discount: Option<f64>,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Price a customer pays today: the sale price when on sale, the list price otherwise.
    #[must_use]
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A product appears on many order lines
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLines,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
