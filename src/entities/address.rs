//! Delivery address entity.
//!
//! An address is owned either by a client (their default delivery address) or
//! by an order (the copy the order was shipped to).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Address database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Model {
    /// Formats the address on one line: `street, city postal_code, country`.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{}, {} {}, {}",
            self.street.as_deref().unwrap_or_default(),
            self.city.as_deref().unwrap_or_default(),
            self.postal_code.as_deref().unwrap_or_default(),
            self.country.as_deref().unwrap_or_default(),
        )
    }
}

/// Addresses are referenced from clients and orders; they own nothing.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
