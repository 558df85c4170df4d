//! Client business logic - customer accounts and their delivery address.
//!
//! A client owns at most one address row. Updating a client with an address
//! edits that row in place; updating without one removes it.

use crate::{
    entities::{Address, Client, Order, address, client},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Address fields as sent by the storefront. All parts are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Payload for creating or replacing a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
}

/// A client together with its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    #[serde(flatten)]
    pub client: client::Model,
    pub address: Option<address::Model>,
}

fn validate_client(input: &ClientInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("Client name cannot be empty"));
    }
    let email = input.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation(format!("Invalid email address: {email}")));
    }
    Ok(())
}

/// Inserts a new address row.
///
/// # Errors
/// Returns an error if the insert fails.
pub(crate) async fn insert_address<C>(db: &C, input: &AddressInput) -> Result<address::Model>
where
    C: ConnectionTrait,
{
    address::ActiveModel {
        street: Set(input.street.clone()),
        city: Set(input.city.clone()),
        postal_code: Set(input.postal_code.clone()),
        country: Set(input.country.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Lists every client with its address, ordered by id.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_clients(db: &DatabaseConnection) -> Result<Vec<ClientDetails>> {
    let rows = Client::find()
        .find_also_related(Address)
        .order_by_asc(client::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(client, address)| ClientDetails { client, address })
        .collect())
}

/// Retrieves a client by id.
///
/// # Errors
/// Returns [`Error::ClientNotFound`] if there is no such client.
pub async fn get_client(db: &DatabaseConnection, client_id: i64) -> Result<ClientDetails> {
    let (client, address) = Client::find_by_id(client_id)
        .find_also_related(Address)
        .one(db)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })?;

    Ok(ClientDetails { client, address })
}

/// Finds a client by exact email address.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_client_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<ClientDetails>> {
    let found = Client::find()
        .filter(client::Column::Email.eq(email.trim()))
        .find_also_related(Address)
        .one(db)
        .await?;

    Ok(found.map(|(client, address)| ClientDetails { client, address }))
}

/// Creates a client and, when given, its address.
///
/// # Errors
/// Returns an error if the name is blank, the email has no `@`, or the insert fails.
#[instrument(skip(db, input))]
pub async fn create_client(db: &DatabaseConnection, input: ClientInput) -> Result<ClientDetails> {
    validate_client(&input)?;

    let txn = db.begin().await?;

    let address = match &input.address {
        Some(address) => Some(insert_address(&txn, address).await?),
        None => None,
    };

    let client = client::ActiveModel {
        name: Set(input.name.trim().to_string()),
        email: Set(input.email.trim().to_string()),
        phone: Set(input.phone),
        address_id: Set(address.as_ref().map(|a| a.id)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(client_id = client.id, "Created client");
    Ok(ClientDetails { client, address })
}

/// Replaces a client's fields and reconciles its address.
///
/// # Errors
/// Returns [`Error::ClientNotFound`] if there is no such client, a validation
/// error for bad input, or a database error.
#[instrument(skip(db, input))]
pub async fn update_client(
    db: &DatabaseConnection,
    client_id: i64,
    input: ClientInput,
) -> Result<ClientDetails> {
    validate_client(&input)?;

    let txn = db.begin().await?;

    let existing = Client::find_by_id(client_id)
        .one(&txn)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })?;
    let old_address_id = existing.address_id;

    let address = match (old_address_id, &input.address) {
        (Some(address_id), Some(fields)) => {
            let mut active: address::ActiveModel = Address::find_by_id(address_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    // Unreachable while the foreign key holds
                    Error::Database(DbErr::RecordNotFound(format!(
                        "Address {address_id} of client {client_id}"
                    )))
                })?
                .into();
            active.street = Set(fields.street.clone());
            active.city = Set(fields.city.clone());
            active.postal_code = Set(fields.postal_code.clone());
            active.country = Set(fields.country.clone());
            Some(active.update(&txn).await?)
        }
        (None, Some(fields)) => Some(insert_address(&txn, fields).await?),
        (_, None) => None,
    };

    let mut active: client::ActiveModel = existing.into();
    active.name = Set(input.name.trim().to_string());
    active.email = Set(input.email.trim().to_string());
    active.phone = Set(input.phone);
    active.address_id = Set(address.as_ref().map(|a| a.id));
    let client = active.update(&txn).await?;

    // The client no longer points at the old row, so it can go.
    if let (Some(address_id), None) = (old_address_id, &address) {
        Address::delete_by_id(address_id).exec(&txn).await?;
    }

    txn.commit().await?;

    info!(client_id, "Updated client");
    Ok(ClientDetails { client, address })
}

/// Deletes a client and its address.
///
/// # Errors
/// Returns [`Error::ClientNotFound`] if there is no such client, or
/// [`Error::Conflict`] if the client still has orders.
#[instrument(skip(db))]
pub async fn delete_client(db: &DatabaseConnection, client_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let client = Client::find_by_id(client_id)
        .one(&txn)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })?;

    let orders = Order::find()
        .filter(crate::entities::order::Column::ClientId.eq(client_id))
        .count(&txn)
        .await?;
    if orders > 0 {
        return Err(Error::Conflict {
            message: format!("Client {client_id} has {orders} order(s) and cannot be deleted"),
        });
    }

    Client::delete_by_id(client_id).exec(&txn).await?;
    if let Some(address_id) = client.address_id {
        Address::delete_by_id(address_id).exec(&txn).await?;
    }

    txn.commit().await?;

    info!(client_id, "Deleted client");
    Ok(())
}
