use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::{DomainError, FieldError};
use crate::domain::order::{CheckoutForm, NewOrder, OrderLineInput, OrderStatus, OrderView};
use crate::domain::outbox::OutboxEvent;
use crate::domain::ports::Store;

/// Turns a cart into an order and owns the order lifecycle afterwards.
///
/// Stock is not touched here: every unit in the cart was already taken from
/// inventory when it was reserved, so checkout only commits the sale.
pub struct CheckoutService {
    store: Arc<dyn Store>,
    deadline: Duration,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Creates the order, copies every cart line into it and empties the cart,
    /// all in one transaction bounded by the configured deadline.
    pub fn checkout(&self, user_id: i64, form: CheckoutForm) -> Result<Uuid, DomainError> {
        form.validate()?;
        let form = form.cleaned();

        let (order_id, line_count) = self
            .store
            .atomically(Some(self.deadline), |tx| {
                let cart = tx.lock_by_user(user_id)?;
                if cart.is_empty() {
                    return Err(DomainError::Validation(vec![FieldError::new(
                        "cart",
                        "cart is empty",
                    )]));
                }

                let order_id = Uuid::new_v4();
                tx.insert_order(&NewOrder {
                    id: order_id,
                    user_id,
                    form: form.clone(),
                    status: OrderStatus::InTransit,
                })?;

                let mut event_lines = Vec::with_capacity(cart.len());
                for (position, line) in (0_i32..).zip(&cart) {
                    let product = tx.product(line.product_id)?.ok_or_else(|| {
                        DomainError::not_found(format!("product {}", line.product_id))
                    })?;
                    let input = OrderLineInput {
                        position,
                        product_id: line.product_id,
                        size: line.size.clone(),
                        quantity: line.reserved,
                        unit_price: product.price,
                    };
                    tx.insert_order_line(order_id, &input)?;
                    tx.delete(line)?;
                    event_lines.push(json!({
                        "product_id": input.product_id,
                        "size": input.size,
                        "quantity": input.quantity,
                        "unit_price": input.unit_price.to_string()
                    }));
                }

                tx.append_outbox(&OutboxEvent::for_order(
                    order_id,
                    "OrderPlaced",
                    json!({
                        "order_id": order_id,
                        "user_id": user_id,
                        "status": OrderStatus::InTransit.as_str(),
                        "lines": event_lines
                    }),
                ))?;

                Ok((order_id, cart.len()))
            })
            .inspect_err(|e| {
                if let DomainError::TransactionAborted(reason) = e {
                    log::warn!("checkout for user {} rolled back: {}", user_id, reason);
                }
            })?;

        log::info!(
            "user {} checked out order {} with {} line(s)",
            user_id,
            order_id,
            line_count
        );
        Ok(order_id)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<OrderView, DomainError> {
        self.store
            .atomically(None, |tx| tx.find_order(order_id))?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))
    }

    /// The single status transition an order allows. Of two concurrent
    /// calls only one succeeds; the other sees `InvalidInput`.
    pub fn mark_delivered(&self, order_id: Uuid) -> Result<OrderView, DomainError> {
        let order = self.store.atomically(None, |tx| {
            let order = tx
                .find_order(order_id)?
                .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
            if !tx.transition_order(order_id, OrderStatus::InTransit, OrderStatus::Delivered)? {
                return Err(DomainError::InvalidInput(format!(
                    "order {order_id} is already delivered"
                )));
            }
            tx.append_outbox(&OutboxEvent::for_order(
                order_id,
                "OrderDelivered",
                json!({ "order_id": order_id, "status": OrderStatus::Delivered.as_str() }),
            ))?;
            Ok(OrderView {
                status: OrderStatus::Delivered,
                ..order
            })
        })?;
        log::info!("order {} delivered", order_id);
        Ok(order)
    }
}
