use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{blocking, AppState};
use crate::domain::order::{CheckoutForm, OrderView};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub surname: String,
    pub name: String,
    pub middle_name: String,
    pub address: String,
    /// International format, e.g. "+7 912 345-67-89"
    pub phone_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: i64,
    pub surname: String,
    pub name: String,
    pub middle_name: String,
    pub address: String,
    pub phone_number: String,
    /// IN_TRANSIT or DELIVERED
    pub status: String,
    pub created_at: String,
    pub total_price: String,
    pub lines: Vec<OrderLineResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        Self {
            total_price: order.total_price().to_string(),
            id: order.id,
            user_id: order.user_id,
            surname: order.surname,
            name: order.name,
            middle_name: order.middle_name,
            address: order.address,
            phone_number: order.phone_number,
            status: order.status.as_str().to_string(),
            created_at: order.created_at.to_rfc3339(),
            lines: order
                .lines
                .into_iter()
                .map(|l| OrderLineResponse {
                    id: l.id,
                    product_id: l.product_id,
                    size: l.size.into(),
                    quantity: l.quantity,
                    unit_price: l.unit_price.to_string(),
                })
                .collect(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /checkout
///
/// Converts the user's whole cart into an order. Creating the order, its
/// lines, the outbox event and emptying the cart happen in one transaction;
/// a 503 means nothing was applied and the request can be retried.
#[utoipa::path(
    post,
    path = "/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse),
        (status = 422, description = "Invalid contact fields or empty cart"),
        (status = 503, description = "Transaction aborted, retry"),
    ),
    tag = "orders"
)]
pub async fn checkout(
    state: web::Data<AppState>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let user_id = body.user_id;
    let form = CheckoutForm {
        surname: body.surname,
        name: body.name,
        middle_name: body.middle_name,
        address: body.address,
        phone_number: body.phone_number,
    };

    let id = blocking(move || state.checkout.checkout(user_id, form)).await?;

    Ok(HttpResponse::Created().json(CreateOrderResponse { id }))
}

/// GET /orders/{id}
///
/// Returns the order together with its order lines.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = blocking(move || state.checkout.get_order(order_id)).await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/delivered
#[utoipa::path(
    post,
    path = "/orders/{id}/delivered",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order marked delivered", body = OrderResponse),
        (status = 400, description = "Order already delivered"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn mark_delivered(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = blocking(move || state.checkout.mark_delivered(order_id)).await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
