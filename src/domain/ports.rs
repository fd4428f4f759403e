use std::time::Duration;

use uuid::Uuid;

use super::cart::CartLine;
use super::errors::DomainError;
use super::order::{NewOrder, OrderLineInput, OrderStatus, OrderView};
use super::outbox::OutboxEvent;
use super::variant::{Product, Variant, VariantKey};

pub trait Catalog {
    fn product(&mut self, product_id: i64) -> Result<Option<Product>, DomainError>;
}

/// Per-variant stock counters.
pub trait InventoryStore {
    /// All variants of a product, sold out or not.
    fn variants(&mut self, product_id: i64) -> Result<Vec<Variant>, DomainError>;

    /// Takes `n` units iff at least `n` are available, as one atomic step.
    /// Returns `false` and changes nothing otherwise, including when the
    /// variant does not exist.
    fn try_decrement(&mut self, key: &VariantKey, n: i32) -> Result<bool, DomainError>;

    /// Returns `n` units to stock. Fails with `NotFound` for an unknown variant.
    fn increment(&mut self, key: &VariantKey, n: i32) -> Result<(), DomainError>;

    fn list_available_variants(&mut self, product_id: i64) -> Result<Vec<Variant>, DomainError> {
        Ok(self
            .variants(product_id)?
            .into_iter()
            .filter(|v| v.available > 0)
            .collect())
    }
}

/// Cart lines, unique per (user, product, size).
pub trait CartStore {
    fn get(&mut self, user_id: i64, key: &VariantKey) -> Result<Option<CartLine>, DomainError>;
    fn create(&mut self, user_id: i64, key: &VariantKey, reserved: i32)
        -> Result<CartLine, DomainError>;
    fn set_quantity(&mut self, line: &CartLine, reserved: i32) -> Result<CartLine, DomainError>;
    fn delete(&mut self, line: &CartLine) -> Result<(), DomainError>;
    /// No ordering guarantee. Takes no locks.
    fn list_by_user(&mut self, user_id: i64) -> Result<Vec<CartLine>, DomainError>;

    /// Like `list_by_user`, but the lines stay locked against concurrent
    /// changes until the transaction ends.
    fn lock_by_user(&mut self, user_id: i64) -> Result<Vec<CartLine>, DomainError> {
        self.list_by_user(user_id)
    }
}

pub trait OrderStore {
    fn insert_order(&mut self, order: &NewOrder) -> Result<(), DomainError>;
    fn insert_order_line(&mut self, order_id: Uuid, line: &OrderLineInput)
        -> Result<Uuid, DomainError>;
    fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderView>, DomainError>;
    /// Moves the order from `from` to `to` as one conditional write. Returns
    /// `false` when the order is no longer in `from`.
    fn transition_order(&mut self, order_id: Uuid, from: OrderStatus, to: OrderStatus)
        -> Result<bool, DomainError>;
    fn append_outbox(&mut self, event: &OutboxEvent) -> Result<(), DomainError>;
}

/// Every capability of the store, bound to one open transaction.
pub trait StoreTx: Catalog + InventoryStore + CartStore + OrderStore {}

impl<T: Catalog + InventoryStore + CartStore + OrderStore> StoreTx for T {}

pub type TxBody<'f> = dyn FnMut(&mut dyn StoreTx) -> Result<(), DomainError> + 'f;

pub trait Store: Send + Sync + 'static {
    /// Runs `body` in an all-or-nothing scope: an `Err` from the body, or a
    /// missed `deadline`, leaves the store exactly as it was.
    fn transaction(&self, deadline: Option<Duration>, body: &mut TxBody<'_>)
        -> Result<(), DomainError>;
}

impl<'s> dyn Store + 's {
    pub fn atomically<T>(
        &self,
        deadline: Option<Duration>,
        mut body: impl FnMut(&mut dyn StoreTx) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut output = None;
        self.transaction(deadline, &mut |tx: &mut dyn StoreTx| {
            output = Some(body(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| DomainError::Internal("transaction finished without a result".into()))
    }
}
