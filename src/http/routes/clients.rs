//! Client endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use crate::core::client::{self, ClientDetails, ClientInput};
use crate::core::order::{self, OrderSummary};
use crate::errors::{Error, Result};
use crate::http::server::AppState;

/// GET /clients
async fn list_clients(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ClientDetails>>> {
    Ok(Json(client::list_clients(&state.db).await?))
}

/// POST /clients
async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClientInput>,
) -> Result<(StatusCode, Json<ClientDetails>)> {
    let created = client::create_client(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /clients/{id}
async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ClientDetails>> {
    Ok(Json(client::get_client(&state.db, id).await?))
}

/// PUT /clients/{id}
async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ClientInput>,
) -> Result<Json<ClientDetails>> {
    Ok(Json(client::update_client(&state.db, id, req).await?))
}

/// DELETE /clients/{id}
async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    client::delete_client(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /clients/by-email/{email}
async fn get_client_by_email(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<ClientDetails>> {
    client::get_client_by_email(&state.db, &email)
        .await?
        .map(Json)
        .ok_or(Error::ClientEmailNotFound { email })
}

/// GET /clients/{id}/commandes
async fn client_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(order::list_orders_for_client(&state.db, id).await?))
}

/// Client routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/clients/by-email/{email}", get(get_client_by_email))
        .route("/clients/{id}/commandes", get(client_orders))
}
