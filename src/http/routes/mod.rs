//! Route handlers organized by resource

pub mod clients;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
