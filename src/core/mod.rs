//! Business logic for the storefront.
//!
//! Every operation is a free async function over a `SeaORM` connection. The HTTP
//! layer is a thin wrapper around these functions.

pub mod client;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod status;
pub mod upload;
