pub mod cart;
pub mod orders;

use actix_web::web;
use utoipa::OpenApi;

use crate::application::checkout_service::CheckoutService;
use crate::application::reservation_service::ReservationService;
use crate::errors::AppError;

/// Services shared by every worker.
pub struct AppState {
    pub reservations: ReservationService,
    pub checkout: CheckoutService,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        cart::list_sizes,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::increase,
        cart::reduce,
        cart::get_cart,
        orders::checkout,
        orders::get_order,
        orders::mark_delivered,
    ),
    components(schemas(
        cart::CartItemRequest,
        cart::CartLineResponse,
        cart::CartItemResponse,
        cart::CartResponse,
        cart::SizesResponse,
        orders::CheckoutRequest,
        orders::CreateOrderResponse,
        orders::OrderLineResponse,
        orders::OrderResponse,
    )),
    tags(
        (name = "cart", description = "Stock reservations held in a shopper's cart"),
        (name = "orders", description = "Checkout and order lifecycle"),
    )
)]
pub struct ApiDoc;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/products/{product_id}/sizes",
        web::get().to(cart::list_sizes),
    )
    .service(
        web::scope("/cart")
            .route("", web::get().to(cart::get_cart))
            .route("/items", web::post().to(cart::add_to_cart))
            .route("/items", web::delete().to(cart::remove_from_cart))
            .route("/items/increase", web::post().to(cart::increase))
            .route("/items/reduce", web::post().to(cart::reduce)),
    )
    .route("/checkout", web::post().to(orders::checkout))
    .service(
        web::scope("/orders")
            .route("/{id}", web::get().to(orders::get_order))
            .route("/{id}/delivered", web::post().to(orders::mark_delivered)),
    );
}

/// Runs blocking service code off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, crate::domain::errors::DomainError> + Send + 'static,
    T: Send + 'static,
{
    Ok(web::block(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??)
}
