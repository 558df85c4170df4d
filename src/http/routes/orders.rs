//! Order endpoints - placement, tracking and status changes

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::core::order::{self, NewOrder, OrderDetails, OrderSummary, TrackingInfo};
use crate::core::status::{self, Cancellation, Delivery, Shipment, StatusChange};
use crate::entities::StatusHistoryModel;
use crate::errors::Result;
use crate::http::server::AppState;

/// Outcome of an email request
#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub message: String,
    pub status: &'static str,
}

/// GET /commandes
async fn list_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(order::list_orders(&state.db).await?))
}

/// POST /commandes
async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderDetails>)> {
    let created = order::create_order(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /commandes/{id}
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(order::get_order(&state.db, id).await?))
}

/// POST /commandes/{id}/envoyer-email
async fn send_confirmation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<EmailResponse>> {
    let (details, sent) = order::send_confirmation(&state.db, &state.mailer, id).await?;
    let email = details.client.map(|c| c.email).unwrap_or_default();

    Ok(Json(if sent {
        EmailResponse {
            message: format!("Email de confirmation envoyé avec succès à {email}"),
            status: "SUCCESS",
        }
    } else {
        EmailResponse {
            message: format!("L'email de confirmation n'a pas pu être envoyé à {email}"),
            status: "FAILED",
        }
    }))
}

/// GET /commandes/{id}/tracking
async fn tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TrackingInfo>> {
    Ok(Json(order::get_tracking(&state.db, id).await?))
}

/// PUT /commandes/{id}/status
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusChange>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(
        status::update_status(&state.db, &state.mailer, id, req).await?,
    ))
}

/// POST /commandes/{id}/ship
async fn ship(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<Shipment>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(
        status::ship_order(&state.db, &state.mailer, id, req).await?,
    ))
}

/// PUT /commandes/{id}/deliver
async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<Delivery>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(
        status::mark_delivered(&state.db, &state.mailer, id, req).await?,
    ))
}

/// POST /commandes/{id}/cancel
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<Cancellation>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(
        status::cancel_order(&state.db, &state.mailer, id, req).await?,
    ))
}

/// GET /commandes/{id}/history
async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StatusHistoryModel>>> {
    Ok(Json(order::status_history(&state.db, id).await?))
}

/// Order routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/commandes", get(list_orders).post(create_order))
        .route("/commandes/{id}", get(get_order))
        .route("/commandes/{id}/envoyer-email", post(send_confirmation))
        .route("/commandes/{id}/tracking", get(tracking))
        .route("/commandes/{id}/status", put(update_status))
        .route("/commandes/{id}/ship", post(ship))
        .route("/commandes/{id}/deliver", put(deliver))
        .route("/commandes/{id}/cancel", post(cancel))
        .route("/commandes/{id}/history", get(history))
}
