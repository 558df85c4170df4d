//! Product endpoints, including multipart uploads with an image.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
};

use crate::core::product::{self, ProductInput};
use crate::core::upload;
use crate::entities::ProductModel;
use crate::errors::{Error, Result};
use crate::http::server::AppState;

/// Upper bound for multipart product forms.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Text fields and optional image read from a product form.
#[derive(Debug, Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    image: Option<(String, Bytes)>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let data = field.bytes().await.map_err(upload_error)?;
                if !data.is_empty() {
                    form.image = Some((file_name, data));
                }
            } else {
                let value = field.text().await.map_err(upload_error)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.text(name)
            .ok_or_else(|| Error::validation(format!("Missing form field: {name}")))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.text(name)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| Error::validation(format!("Invalid value for {name}: {v}")))
            })
            .transpose()
    }

    /// Builds the product fields; `image_url` is filled in by the caller.
    fn into_input(self, image_url: Option<String>) -> Result<ProductInput> {
        Ok(ProductInput {
            name: self.required("name")?,
            category: self.required("category")?,
            price: self
                .parsed("price")?
                .ok_or_else(|| Error::validation("Missing form field: price"))?,
            stock: self
                .parsed("stock")?
                .ok_or_else(|| Error::validation("Missing form field: stock"))?,
            image_url,
            description: self.text("description"),
            sale_price: None,
            discount: self.parsed("discount")?,
        })
    }
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> Error {
    Error::Upload {
        message: e.body_text(),
    }
}

/// Stores an uploaded image and links it to the product.
async fn attach_image(
    state: &AppState,
    product: ProductModel,
    image: Option<(String, Bytes)>,
) -> Result<ProductModel> {
    match image {
        Some((file_name, data)) => {
            let url = upload::store_image(&state.config.uploads.dir, &file_name, &data).await?;
            product::set_image(&state.db, product.id, url).await
        }
        None => Ok(product),
    }
}

/// GET /produits
async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ProductModel>>> {
    Ok(Json(product::list_products(&state.db).await?))
}

/// POST /produits
async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductModel>)> {
    let created = product::create_product(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /produits/upload
async fn create_product_with_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductModel>)> {
    let mut form = ProductForm::read(multipart).await?;
    let image = form.image.take();
    let created = product::create_product(&state.db, form.into_input(None)?).await?;

    let created = attach_image(&state, created, image).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /produits/{id}
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductModel>> {
    Ok(Json(product::get_product(&state.db, id).await?))
}

/// PUT /produits/{id}
async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ProductInput>,
) -> Result<Json<ProductModel>> {
    Ok(Json(product::update_product(&state.db, id, req).await?))
}

/// PUT /produits/{id}/upload - keeps the current image unless a new one is sent
async fn update_product_with_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<ProductModel>> {
    let existing = product::get_product(&state.db, id).await?;
    let mut form = ProductForm::read(multipart).await?;
    let image = form.image.take();
    let updated =
        product::update_product(&state.db, id, form.into_input(existing.image_url)?).await?;

    Ok(Json(attach_image(&state, updated, image).await?))
}

/// DELETE /produits/{id}
async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    product::delete_product(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /produits/{id}/solde/{pourcentage}
async fn apply_discount(
    State(state): State<Arc<AppState>>,
    Path((id, percent)): Path<(i64, f64)>,
) -> Result<Json<ProductModel>> {
    Ok(Json(product::apply_discount(&state.db, id, percent).await?))
}

/// PUT /produits/{id}/solde/remove
async fn remove_discount(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductModel>> {
    Ok(Json(product::remove_discount(&state.db, id).await?))
}

/// Product routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/produits", get(list_products).post(create_product))
        .route(
            "/produits/upload",
            post(create_product_with_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/produits/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route(
            "/produits/{id}/upload",
            put(update_product_with_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/produits/{id}/solde/remove", put(remove_discount))
        .route("/produits/{id}/solde/{pourcentage}", put(apply_discount))
}
