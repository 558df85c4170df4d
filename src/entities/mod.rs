//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the storefront tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod address;
pub mod client;
pub mod order;
pub mod order_line;
pub mod payment;
pub mod product;
pub mod status_history;

// Re-export specific types to avoid conflicts
pub use address::{Column as AddressColumn, Entity as Address, Model as AddressModel};
pub use client::{Column as ClientColumn, Entity as Client, Model as ClientModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use order_line::{Column as OrderLineColumn, Entity as OrderLine, Model as OrderLineModel};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentStatus};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use status_history::{
    Column as StatusHistoryColumn, Entity as StatusHistory, Model as StatusHistoryModel,
};
