//! Payment endpoints - direct charges and Stripe Checkout

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::core::payment::{self, CheckoutConfirmation, CheckoutInput, PaymentRequest};
use crate::entities::PaymentModel;
use crate::errors::Result;
use crate::http::server::AppState;

/// Hosted checkout session handed back to the storefront
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Query string Stripe appends to the success URL
#[derive(Debug, Deserialize)]
pub struct CheckoutSuccessParams {
    pub session_id: String,
}

/// Confirmation returned after a paid checkout
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    #[serde(flatten)]
    pub confirmation: CheckoutConfirmation,
}

/// POST /paiements
async fn pay(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentModel>> {
    let currency = &state.config.stripe.currency;
    Ok(Json(
        payment::pay_order(&state.db, state.gateway.as_ref(), currency, req).await?,
    ))
}

/// GET /paiements/{id}
async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentModel>> {
    Ok(Json(payment::get_payment(&state.db, id).await?))
}

/// POST /paiements/create-checkout-session
async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutInput>,
) -> Result<Json<CheckoutResponse>> {
    let currency = &state.config.stripe.currency;
    let session =
        payment::create_checkout_session(&state.db, state.gateway.as_ref(), currency, req).await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// GET /paiements/checkout-success?session_id=...
async fn checkout_success(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckoutSuccessParams>,
) -> Result<Json<CheckoutSuccessResponse>> {
    let confirmation =
        payment::confirm_checkout(&state.db, state.gateway.as_ref(), &params.session_id).await?;

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        confirmation,
    }))
}

/// Payment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/paiements", post(pay))
        .route("/paiements/create-checkout-session", post(create_checkout_session))
        .route("/paiements/checkout-success", get(checkout_success))
        .route("/paiements/{id}", get(get_payment))
}
