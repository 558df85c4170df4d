//! Unified error type for the storefront.
//!
//! Business functions in [`crate::core`] return [`Result`]; the HTTP layer maps
//! each variant to a status code in [`crate::http::error`].

use thiserror::Error;

/// All errors produced by the storefront.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Rejected input (empty names, bad quantities, ...)
    #[error("Validation error: {message}")]
    Validation {
        /// What was rejected and why
        message: String,
    },

    /// Monetary amount that is not finite or not positive where required
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Discount percentage outside of `(0, 100)`
    #[error("Pourcentage invalide: {percent}")]
    InvalidDiscount {
        /// The rejected percentage
        percent: f64,
    },

    #[error("Client non trouvé avec ID : {id}")]
    ClientNotFound { id: i64 },

    #[error("Client non trouvé avec email : {email}")]
    ClientEmailNotFound { email: String },

    #[error("Produit non trouvé id={id}")]
    ProductNotFound { id: i64 },

    #[error("Commande non trouvée id={id}")]
    OrderNotFound { id: i64 },

    #[error("Paiement introuvable id={id}")]
    PaymentNotFound { id: i64 },

    /// Not enough units left to fulfil a line
    #[error("Stock insuffisant pour le produit : {product} (disponible {available}, demandé {requested})")]
    InsufficientStock {
        /// Product name
        product: String,
        /// Units in stock
        available: i32,
        /// Units requested
        requested: i32,
    },

    /// Operation would break a relationship or a uniqueness rule
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// The order already has a successful payment
    #[error("Paiement déjà effectué pour la commande {order_id}")]
    PaymentAlreadyExists {
        /// Order that is already paid
        order_id: i64,
    },

    /// The gateway refused the charge
    #[error("Erreur de paiement Stripe: {message}")]
    PaymentFailed {
        /// Gateway message
        message: String,
    },

    /// A checkout session was looked up but is not paid
    #[error("Paiement non confirmé pour la session {session_id}")]
    PaymentNotConfirmed {
        /// Stripe checkout session id
        session_id: String,
    },

    /// The gateway could not be reached or answered garbage
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),

    /// Image upload could not be read or stored
    #[error("Upload error: {message}")]
    Upload {
        /// What went wrong
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
