use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{blocking, AppState};
use crate::domain::cart::{CartLine, CartSummary};
use crate::domain::variant::Size;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

/// Identifies a cart line. A missing or blank `size` means the product is
/// sold without sizes.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CartItemRequest {
    pub user_id: i64,
    pub product_id: i64,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub product_id: i64,
    pub size: Option<String>,
    pub reserved: i32,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            size: line.size.into(),
            reserved: line.reserved,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub size: Option<String>,
    pub reserved: i32,
    /// Decimal as a string, e.g. "9.99"
    pub unit_price: String,
    pub subtotal: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub user_id: i64,
    pub items: Vec<CartItemResponse>,
    pub total_price: String,
    pub total_quantity: i64,
}

impl From<CartSummary> for CartResponse {
    fn from(cart: CartSummary) -> Self {
        Self {
            user_id: cart.user_id,
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    subtotal: item.subtotal().to_string(),
                    product_id: item.line.product_id,
                    product_name: item.product_name,
                    size: item.line.size.into(),
                    reserved: item.line.reserved,
                    unit_price: item.unit_price.to_string(),
                })
                .collect(),
            total_price: cart.total_price.to_string(),
            total_quantity: cart.total_quantity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SizesResponse {
    pub product_id: i64,
    pub sizes: Vec<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /products/{product_id}/sizes
///
/// Sizes the user can still add: in stock and not already in their cart.
#[utoipa::path(
    get,
    path = "/products/{product_id}/sizes",
    params(
        ("product_id" = i64, Path, description = "Product id"),
        ("user_id" = i64, Query, description = "Shopper id"),
    ),
    responses(
        (status = 200, description = "Choosable sizes", body = SizesResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "cart"
)]
pub async fn list_sizes(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<UserParams>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let user_id = query.user_id;

    let sizes = blocking(move || state.reservations.list_choosable_sizes(user_id, product_id)).await?;

    Ok(HttpResponse::Ok().json(SizesResponse { product_id, sizes }))
}

/// POST /cart/items
///
/// Reserves one unit and creates the cart line.
#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = CartItemRequest,
    responses(
        (status = 201, description = "Unit reserved", body = CartLineResponse),
        (status = 400, description = "Product needs a size, or has none"),
        (status = 404, description = "Product or size not found"),
        (status = 409, description = "Out of stock or already in cart"),
    ),
    tag = "cart"
)]
pub async fn add_to_cart(
    state: web::Data<AppState>,
    body: web::Json<CartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let size = Size::from(body.size);

    let line = blocking(move || state.reservations.add(body.user_id, body.product_id, size)).await?;

    Ok(HttpResponse::Created().json(CartLineResponse::from(line)))
}

/// DELETE /cart/items
///
/// Drops the line and returns its units to stock.
#[utoipa::path(
    delete,
    path = "/cart/items",
    params(
        ("user_id" = i64, Query, description = "Shopper id"),
        ("product_id" = i64, Query, description = "Product id"),
        ("size" = Option<String>, Query, description = "Size label, omitted for unsized products"),
    ),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "No such cart line"),
    ),
    tag = "cart"
)]
pub async fn remove_from_cart(
    state: web::Data<AppState>,
    query: web::Query<CartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let item = query.into_inner();
    let size = Size::from(item.size);

    blocking(move || state.reservations.remove(item.user_id, item.product_id, size)).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /cart/items/increase
///
/// Reserves one more unit. When the variant is sold out the line comes back
/// unchanged.
#[utoipa::path(
    post,
    path = "/cart/items/increase",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Current state of the line", body = CartLineResponse),
        (status = 404, description = "No such cart line"),
    ),
    tag = "cart"
)]
pub async fn increase(
    state: web::Data<AppState>,
    body: web::Json<CartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let size = Size::from(body.size);

    let line =
        blocking(move || state.reservations.increase(body.user_id, body.product_id, size)).await?;

    Ok(HttpResponse::Ok().json(CartLineResponse::from(line)))
}

/// POST /cart/items/reduce
///
/// Releases one unit. A line holding a single unit is left as is.
#[utoipa::path(
    post,
    path = "/cart/items/reduce",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Current state of the line", body = CartLineResponse),
        (status = 404, description = "No such cart line"),
    ),
    tag = "cart"
)]
pub async fn reduce(
    state: web::Data<AppState>,
    body: web::Json<CartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let size = Size::from(body.size);

    let line =
        blocking(move || state.reservations.reduce(body.user_id, body.product_id, size)).await?;

    Ok(HttpResponse::Ok().json(CartLineResponse::from(line)))
}

/// GET /cart
#[utoipa::path(
    get,
    path = "/cart",
    params(
        ("user_id" = i64, Query, description = "Shopper id"),
    ),
    responses(
        (status = 200, description = "Cart with totals", body = CartResponse),
    ),
    tag = "cart"
)]
pub async fn get_cart(
    state: web::Data<AppState>,
    query: web::Query<UserParams>,
) -> Result<HttpResponse, AppError> {
    let user_id = query.user_id;

    let cart = blocking(move || state.reservations.cart(user_id)).await?;

    Ok(HttpResponse::Ok().json(CartResponse::from(cart)))
}
