//! Product business logic - catalog maintenance, discounts and stock.
//!
//! Stock only moves through [`decrement_stock`] and [`increment_stock`], which
//! run as single `UPDATE` statements so concurrent orders cannot oversell.

use crate::{
    entities::{OrderLine, Product, order_line, product},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{info, instrument};

const MAX_DESCRIPTION_LEN: usize = 1000;

/// Payload for creating or replacing a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub discount: Option<f64>,
}

/// Sale price for `price` reduced by `percent` percent, rounded to cents.
#[must_use]
pub fn discounted_price(price: f64, percent: f64) -> f64 {
    ((price - price * percent / 100.0) * 100.0).round() / 100.0
}

fn validate_discount(percent: f64) -> Result<()> {
    if !percent.is_finite() || percent <= 0.0 || percent >= 100.0 {
        return Err(Error::InvalidDiscount { percent });
    }
    Ok(())
}

/// Checks the input and derives the sale price from the discount when only the
/// percentage was given.
fn normalize(mut input: ProductInput) -> Result<ProductInput> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    if input.category.trim().is_empty() {
        return Err(Error::validation("Product category cannot be empty"));
    }
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(Error::InvalidAmount {
            amount: input.price,
        });
    }
    if input.stock < 0 {
        return Err(Error::validation(format!(
            "Stock cannot be negative: {}",
            input.stock
        )));
    }
    if input
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
    {
        return Err(Error::validation(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if let Some(sale_price) = input.sale_price {
        if !sale_price.is_finite() || sale_price < 0.0 {
            return Err(Error::InvalidAmount { amount: sale_price });
        }
    }
    if let Some(percent) = input.discount {
        validate_discount(percent)?;
        if input.sale_price.is_none() {
            input.sale_price = Some(discounted_price(input.price, percent));
        }
    }

    input.name = input.name.trim().to_string();
    input.category = input.category.trim().to_string();
    Ok(input)
}

/// Retrieves every product, ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .order_by_asc(product::Column::Name)
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by id.
///
/// # Errors
/// Returns [`Error::ProductNotFound`] if there is no such product.
pub async fn get_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })
}

/// Creates a product after validating its fields.
///
/// # Errors
/// Returns an error if:
/// - The name or category is blank
/// - The price is negative or not finite
/// - The stock is negative or the description is too long
/// - The discount is outside `(0, 100)`
/// - The database insert fails
#[instrument(skip(db, input), fields(name = %input.name))]
pub async fn create_product(db: &DatabaseConnection, input: ProductInput) -> Result<product::Model> {
    let input = normalize(input)?;
    let now = chrono::Utc::now();

    let product = product::ActiveModel {
        name: Set(input.name),
        category: Set(input.category),
        price: Set(input.price),
        stock: Set(input.stock),
        image_url: Set(input.image_url),
        description: Set(input.description),
        sale_price: Set(input.sale_price),
        discount: Set(input.discount),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(product_id = product.id, name = %product.name, "Created product");
    Ok(product)
}

/// Replaces every editable field of a product.
///
/// # Errors
/// Same validation as [`create_product`], plus [`Error::ProductNotFound`].
#[instrument(skip(db, input))]
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    input: ProductInput,
) -> Result<product::Model> {
    let input = normalize(input)?;

    let mut product: product::ActiveModel = get_product(db, product_id).await?.into();
    product.name = Set(input.name);
    product.category = Set(input.category);
    product.price = Set(input.price);
    product.stock = Set(input.stock);
    product.image_url = Set(input.image_url);
    product.description = Set(input.description);
    product.sale_price = Set(input.sale_price);
    product.discount = Set(input.discount);
    product.updated_at = Set(chrono::Utc::now());

    let product = product.update(db).await?;
    info!(product_id, "Updated product");
    Ok(product)
}

/// Deletes a product that no order refers to.
///
/// # Errors
/// Returns [`Error::ProductNotFound`] if there is no such product, or
/// [`Error::Conflict`] if order lines still reference it.
#[instrument(skip(db))]
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<()> {
    get_product(db, product_id).await?;

    let references = OrderLine::find()
        .filter(order_line::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    if references > 0 {
        return Err(Error::Conflict {
            message: format!("Product {product_id} is referenced by {references} order line(s)"),
        });
    }

    Product::delete_by_id(product_id).exec(db).await?;
    info!(product_id, "Deleted product");
    Ok(())
}

/// Puts a product on sale at `percent` off its list price.
///
/// # Errors
/// Returns [`Error::InvalidDiscount`] unless `0 < percent < 100`, or
/// [`Error::ProductNotFound`].
#[instrument(skip(db))]
pub async fn apply_discount(
    db: &DatabaseConnection,
    product_id: i64,
    percent: f64,
) -> Result<product::Model> {
    validate_discount(percent)?;

    let existing = get_product(db, product_id).await?;
    let sale_price = discounted_price(existing.price, percent);

    let mut product: product::ActiveModel = existing.into();
    product.discount = Set(Some(percent));
    product.sale_price = Set(Some(sale_price));
    product.updated_at = Set(chrono::Utc::now());

    let product = product.update(db).await?;
    info!(product_id, percent, sale_price, "Applied discount");
    Ok(product)
}

/// Takes a product off sale.
///
/// # Errors
/// Returns [`Error::ProductNotFound`] if there is no such product.
#[instrument(skip(db))]
pub async fn remove_discount(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_product(db, product_id).await?.into();
    product.discount = Set(None);
    product.sale_price = Set(None);
    product.updated_at = Set(chrono::Utc::now());

    let product = product.update(db).await?;
    info!(product_id, "Removed discount");
    Ok(product)
}

/// Points a product at a newly uploaded image.
///
/// # Errors
/// Returns [`Error::ProductNotFound`] if there is no such product.
#[instrument(skip(db))]
pub async fn set_image(
    db: &DatabaseConnection,
    product_id: i64,
    image_url: String,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_product(db, product_id).await?.into();
    product.image_url = Set(Some(image_url));
    product.updated_at = Set(chrono::Utc::now());

    let product = product.update(db).await?;
    info!(product_id, "Updated product image");
    Ok(product)
}

/// Atomically takes `quantity` units out of stock.
///
/// Works with both a database connection and a transaction.
///
/// # Errors
/// Returns [`Error::InsufficientStock`] when fewer than `quantity` units are
/// left, [`Error::ProductNotFound`], or a validation error for a non-positive
/// quantity.
pub async fn decrement_stock<C>(db: &C, product_id: i64, quantity: i32) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be positive: {quantity}"
        )));
    }

    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    // stock = stock - quantity, only while enough units remain
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InsufficientStock {
            product: product.name,
            available: product.stock,
            requested: quantity,
        });
    }

    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })
}

/// Atomically puts `quantity` units back into stock.
///
/// # Errors
/// Returns [`Error::ProductNotFound`] or a database error.
pub async fn increment_stock<C>(db: &C, product_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::ProductNotFound { id: product_id });
    }
    Ok(())
}
