use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::cart::CartLine;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    CheckoutForm, NewOrder, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::outbox::OutboxEvent;
use crate::domain::ports::{CartStore, Catalog, InventoryStore, OrderStore, Store, TxBody};
use crate::domain::variant::{Product, Variant, VariantKey};

#[derive(Debug, Clone)]
struct OrderRecord {
    user_id: i64,
    form: CheckoutForm,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct State {
    products: BTreeMap<i64, Product>,
    variants: BTreeMap<VariantKey, i32>,
    cart_lines: BTreeMap<(i64, VariantKey), i32>,
    orders: BTreeMap<Uuid, OrderRecord>,
    order_lines: Vec<(Uuid, i32, OrderLineView)>,
    outbox: Vec<OutboxEvent>,
}

/// Process-local store.
///
/// Transactions are serialized behind one mutex and applied to a working copy
/// that replaces the live state only when the body succeeds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        self.lock_state().products.insert(product.id, product);
    }

    /// Creates the variant, or resets its counter if it already exists.
    pub fn stock(&self, key: VariantKey, available: i32) -> Result<(), DomainError> {
        let mut state = self.lock_state();
        if !state.products.contains_key(&key.product_id) {
            return Err(DomainError::not_found(format!("product {}", key.product_id)));
        }
        if available < 0 {
            return Err(DomainError::InvalidInput("stock must not be negative".into()));
        }
        state.variants.insert(key, available);
        Ok(())
    }

    pub fn available(&self, key: &VariantKey) -> Option<i32> {
        self.lock_state().variants.get(key).copied()
    }

    pub fn order_line_count(&self) -> usize {
        self.lock_state().order_lines.len()
    }

    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.lock_state().outbox.clone()
    }

    // Inspection and seeding tolerate a poisoned lock; a panicking test body
    // must not hide the state it left behind.
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn transaction(
        &self,
        deadline: Option<Duration>,
        body: &mut TxBody<'_>,
    ) -> Result<(), DomainError> {
        let started = Instant::now();
        let mut live = self
            .state
            .lock()
            .map_err(|_| DomainError::Internal("memory store lock poisoned".into()))?;

        let mut working = live.clone();
        body(&mut MemoryTx {
            state: &mut working,
        })?;

        if let Some(limit) = deadline {
            if started.elapsed() > limit {
                return Err(DomainError::TransactionAborted(format!(
                    "deadline of {limit:?} exceeded"
                )));
            }
        }
        *live = working;
        Ok(())
    }
}

struct MemoryTx<'a> {
    state: &'a mut State,
}

fn require_positive(n: i32) -> Result<(), DomainError> {
    if n > 0 {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!("quantity must be positive, got {n}")))
    }
}

impl Catalog for MemoryTx<'_> {
    fn product(&mut self, product_id: i64) -> Result<Option<Product>, DomainError> {
        Ok(self.state.products.get(&product_id).cloned())
    }
}

impl InventoryStore for MemoryTx<'_> {
    fn variants(&mut self, product_id: i64) -> Result<Vec<Variant>, DomainError> {
        Ok(self
            .state
            .variants
            .iter()
            .filter(|(key, _)| key.product_id == product_id)
            .map(|(key, available)| Variant {
                key: key.clone(),
                available: *available,
            })
            .collect())
    }

    fn try_decrement(&mut self, key: &VariantKey, n: i32) -> Result<bool, DomainError> {
        require_positive(n)?;
        match self.state.variants.get_mut(key) {
            Some(available) if *available >= n => {
                *available -= n;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn increment(&mut self, key: &VariantKey, n: i32) -> Result<(), DomainError> {
        require_positive(n)?;
        let available = self
            .state
            .variants
            .get_mut(key)
            .ok_or_else(|| DomainError::not_found(format!("variant {key}")))?;
        *available += n;
        Ok(())
    }
}

impl CartStore for MemoryTx<'_> {
    fn get(&mut self, user_id: i64, key: &VariantKey) -> Result<Option<CartLine>, DomainError> {
        Ok(self
            .state
            .cart_lines
            .get(&(user_id, key.clone()))
            .map(|reserved| CartLine {
                user_id,
                product_id: key.product_id,
                size: key.size.clone(),
                reserved: *reserved,
            }))
    }

    fn create(
        &mut self,
        user_id: i64,
        key: &VariantKey,
        reserved: i32,
    ) -> Result<CartLine, DomainError> {
        require_positive(reserved)?;
        if !self.state.products.contains_key(&key.product_id) {
            return Err(DomainError::not_found(format!("product {}", key.product_id)));
        }
        let slot = (user_id, key.clone());
        if self.state.cart_lines.contains_key(&slot) {
            return Err(DomainError::AlreadyInCart(key.clone()));
        }
        self.state.cart_lines.insert(slot, reserved);
        Ok(CartLine {
            user_id,
            product_id: key.product_id,
            size: key.size.clone(),
            reserved,
        })
    }

    fn set_quantity(&mut self, line: &CartLine, reserved: i32) -> Result<CartLine, DomainError> {
        require_positive(reserved)?;
        let current = self
            .state
            .cart_lines
            .get_mut(&(line.user_id, line.variant()))
            .ok_or_else(|| DomainError::not_found(format!("cart line for {}", line.variant())))?;
        *current = reserved;
        Ok(CartLine {
            reserved,
            ..line.clone()
        })
    }

    fn delete(&mut self, line: &CartLine) -> Result<(), DomainError> {
        self.state
            .cart_lines
            .remove(&(line.user_id, line.variant()))
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("cart line for {}", line.variant())))
    }

    fn list_by_user(&mut self, user_id: i64) -> Result<Vec<CartLine>, DomainError> {
        Ok(self
            .state
            .cart_lines
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, key), reserved)| CartLine {
                user_id,
                product_id: key.product_id,
                size: key.size.clone(),
                reserved: *reserved,
            })
            .collect())
    }
}

impl OrderStore for MemoryTx<'_> {
    fn insert_order(&mut self, order: &NewOrder) -> Result<(), DomainError> {
        if self.state.orders.contains_key(&order.id) {
            return Err(DomainError::Internal(format!("duplicate order id {}", order.id)));
        }
        self.state.orders.insert(
            order.id,
            OrderRecord {
                user_id: order.user_id,
                form: order.form.clone(),
                status: order.status,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn insert_order_line(
        &mut self,
        order_id: Uuid,
        line: &OrderLineInput,
    ) -> Result<Uuid, DomainError> {
        require_positive(line.quantity)?;
        if !self.state.orders.contains_key(&order_id) {
            return Err(DomainError::not_found(format!("order {order_id}")));
        }
        if !self.state.products.contains_key(&line.product_id) {
            return Err(DomainError::not_found(format!("product {}", line.product_id)));
        }
        if self
            .state
            .order_lines
            .iter()
            .any(|(owner, position, _)| *owner == order_id && *position == line.position)
        {
            return Err(DomainError::Internal(format!(
                "order {order_id} already has a line at position {}",
                line.position
            )));
        }
        let id = Uuid::new_v4();
        self.state.order_lines.push((
            order_id,
            line.position,
            OrderLineView {
                id,
                product_id: line.product_id,
                size: line.size.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price.clone(),
            },
        ));
        Ok(id)
    }

    fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let Some(order) = self.state.orders.get(&order_id) else {
            return Ok(None);
        };
        let mut lines: Vec<(i32, OrderLineView)> = self
            .state
            .order_lines
            .iter()
            .filter(|(owner, _, _)| *owner == order_id)
            .map(|(_, position, line)| (*position, line.clone()))
            .collect();
        lines.sort_by_key(|(position, _)| *position);
        let lines = lines.into_iter().map(|(_, line)| line).collect();
        Ok(Some(OrderView {
            id: order_id,
            user_id: order.user_id,
            surname: order.form.surname.clone(),
            name: order.form.name.clone(),
            middle_name: order.form.middle_name.clone(),
            address: order.form.address.clone(),
            phone_number: order.form.phone_number.clone(),
            status: order.status,
            created_at: order.created_at,
            lines,
        }))
    }

    fn transition_order(
        &mut self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError> {
        let order = self
            .state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    fn append_outbox(&mut self, event: &OutboxEvent) -> Result<(), DomainError> {
        self.state.outbox.push(event.clone());
        Ok(())
    }
}
