use std::sync::Arc;

use crate::domain::cart::{CartItem, CartLine, CartSummary};
use crate::domain::errors::DomainError;
use crate::domain::ports::{Store, StoreTx};
use crate::domain::variant::{Product, Size, VariantKey};

/// Cart mutations. Each call runs in one store transaction that touches the
/// stock counter and the cart line together.
pub struct ReservationService {
    store: Arc<dyn Store>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Dispatches to the sized or unsized add path.
    pub fn add(&self, user_id: i64, product_id: i64, size: Size) -> Result<CartLine, DomainError> {
        match size {
            Size::Unsized => self.add_without_size(user_id, product_id),
            Size::Sized(label) => self.add_with_size(user_id, product_id, &label),
        }
    }

    /// Reserves one unit of a product that is sold without sizes.
    pub fn add_without_size(&self, user_id: i64, product_id: i64) -> Result<CartLine, DomainError> {
        let line = self.store.atomically(None, |tx| {
            require_product(tx, product_id)?;
            let variants = tx.variants(product_id)?;
            let key = match variants.as_slice() {
                [] => {
                    return Err(DomainError::not_found(format!(
                        "stock for product {product_id}"
                    )))
                }
                [only] if !only.key.size.is_sized() => only.key.clone(),
                _ => {
                    return Err(DomainError::InvalidInput(format!(
                        "product {product_id} is sold in sizes; choose one"
                    )))
                }
            };
            reserve_one(tx, user_id, &key)
        })?;
        log::info!("user {} reserved 1 x {}", user_id, line.variant());
        Ok(line)
    }

    /// Sizes the user can still pick: in stock and not already in their cart.
    pub fn list_choosable_sizes(
        &self,
        user_id: i64,
        product_id: i64,
    ) -> Result<Vec<String>, DomainError> {
        self.store.atomically(None, |tx| {
            require_product(tx, product_id)?;
            let held: Vec<Size> = tx
                .list_by_user(user_id)?
                .into_iter()
                .filter(|line| line.product_id == product_id)
                .map(|line| line.size)
                .collect();
            Ok(tx
                .list_available_variants(product_id)?
                .into_iter()
                .filter(|v| !held.contains(&v.key.size))
                .filter_map(|v| v.key.size.as_deref().map(str::to_string))
                .collect())
        })
    }

    pub fn add_with_size(
        &self,
        user_id: i64,
        product_id: i64,
        size: &str,
    ) -> Result<CartLine, DomainError> {
        let key = match Size::from(Some(size.to_string())) {
            Size::Unsized => return Err(DomainError::InvalidInput("size must not be blank".into())),
            sized => VariantKey::new(product_id, sized),
        };
        let line = self.store.atomically(None, |tx| {
            require_product(tx, product_id)?;
            if !tx.variants(product_id)?.iter().any(|v| v.key == key) {
                return Err(DomainError::not_found(format!("variant {key}")));
            }
            reserve_one(tx, user_id, &key)
        })?;
        log::info!("user {} reserved 1 x {}", user_id, line.variant());
        Ok(line)
    }

    /// Drops the line and returns everything it reserved to stock.
    pub fn remove(&self, user_id: i64, product_id: i64, size: Size) -> Result<(), DomainError> {
        let key = VariantKey::new(product_id, size);
        let released = self.store.atomically(None, |tx| {
            let line = require_line(tx, user_id, &key)?;
            tx.increment(&key, line.reserved)?;
            tx.delete(&line)?;
            Ok(line.reserved)
        })?;
        log::info!("user {} released {} x {}", user_id, released, key);
        Ok(())
    }

    /// Reserves one more unit. A sold-out variant leaves the line unchanged
    /// without reporting an error.
    pub fn increase(&self, user_id: i64, product_id: i64, size: Size) -> Result<CartLine, DomainError> {
        let key = VariantKey::new(product_id, size);
        self.store.atomically(None, |tx| {
            let line = require_line(tx, user_id, &key)?;
            if !tx.try_decrement(&key, 1)? {
                log::debug!("increase of {} for user {} ignored: sold out", key, user_id);
                return Ok(line);
            }
            let reserved = line.reserved + 1;
            tx.set_quantity(&line, reserved)
        })
    }

    /// Releases one unit. A line holding a single unit is left as is; use
    /// `remove` to drop it.
    pub fn reduce(&self, user_id: i64, product_id: i64, size: Size) -> Result<CartLine, DomainError> {
        let key = VariantKey::new(product_id, size);
        self.store.atomically(None, |tx| {
            let line = require_line(tx, user_id, &key)?;
            if line.reserved <= 1 {
                log::debug!("reduce of {} for user {} ignored: last unit", key, user_id);
                return Ok(line);
            }
            tx.increment(&key, 1)?;
            let reserved = line.reserved - 1;
            tx.set_quantity(&line, reserved)
        })
    }

    /// The user's cart priced against the current catalog.
    pub fn cart(&self, user_id: i64) -> Result<CartSummary, DomainError> {
        let items = self.store.atomically(None, |tx| {
            let lines = tx.list_by_user(user_id)?;
            let mut items = Vec::with_capacity(lines.len());
            for line in lines {
                let product = require_product(tx, line.product_id)?;
                items.push(CartItem {
                    line,
                    product_name: product.name,
                    unit_price: product.price,
                });
            }
            Ok(items)
        })?;
        Ok(CartSummary::new(user_id, items))
    }
}

fn require_product(tx: &mut dyn StoreTx, product_id: i64) -> Result<Product, DomainError> {
    tx.product(product_id)?
        .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))
}

fn require_line(
    tx: &mut dyn StoreTx,
    user_id: i64,
    key: &VariantKey,
) -> Result<CartLine, DomainError> {
    tx.get(user_id, key)?
        .ok_or_else(|| DomainError::not_found(format!("cart line for {key}")))
}

fn reserve_one(tx: &mut dyn StoreTx, user_id: i64, key: &VariantKey) -> Result<CartLine, DomainError> {
    if tx.get(user_id, key)?.is_some() {
        return Err(DomainError::AlreadyInCart(key.clone()));
    }
    if !tx.try_decrement(key, 1)? {
        return Err(DomainError::OutOfStock(key.clone()));
    }
    tx.create(user_id, key, 1)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Barrier;
    use std::thread;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;

    const BOOTS: i64 = 4;
    const MUG: i64 = 59;

    fn setup() -> (Arc<MemoryStore>, ReservationService) {
        let store = Arc::new(MemoryStore::new());
        store.add_product(Product {
            id: BOOTS,
            name: "Boots".to_string(),
            slug: "boots".to_string(),
            price: BigDecimal::from_str("120.00").unwrap(),
        });
        store.add_product(Product {
            id: MUG,
            name: "Mug".to_string(),
            slug: "mug".to_string(),
            price: BigDecimal::from_str("7.50").unwrap(),
        });
        store.stock(boots("46"), 0).unwrap();
        store.stock(boots("47"), 5).unwrap();
        store.stock(boots("48"), 2).unwrap();
        store.stock(mug(), 3).unwrap();
        let service = ReservationService::new(store.clone());
        (store, service)
    }

    fn boots(size: &str) -> VariantKey {
        VariantKey::new(BOOTS, Size::sized(size))
    }

    fn mug() -> VariantKey {
        VariantKey::new(MUG, Size::Unsized)
    }

    fn line(service: &ReservationService, user_id: i64, key: &VariantKey) -> Option<CartLine> {
        service
            .cart(user_id)
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.line)
            .find(|l| l.variant() == *key)
    }

    fn reserved_total(service: &ReservationService, users: &[i64], key: &VariantKey) -> i32 {
        users
            .iter()
            .filter_map(|u| line(service, *u, key))
            .map(|l| l.reserved)
            .sum()
    }

    #[test]
    fn add_without_size_reserves_one_unit() {
        let (store, service) = setup();
        let added = service.add_without_size(1, MUG).unwrap();
        assert_eq!(added.reserved, 1);
        assert_eq!(added.size, Size::Unsized);
        assert_eq!(store.available(&mug()), Some(2));
    }

    #[test]
    fn add_without_size_rejects_sized_product() {
        let (store, service) = setup();
        let err = service.add_without_size(1, BOOTS).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert_eq!(store.available(&boots("48")), Some(2));
    }

    #[test]
    fn add_without_size_on_unstocked_product_is_not_found() {
        let (store, service) = setup();
        store.add_product(Product {
            id: 7,
            name: "Scarf".to_string(),
            slug: "scarf".to_string(),
            price: BigDecimal::from_str("15.00").unwrap(),
        });
        match service.add_without_size(1, 7) {
            Err(DomainError::NotFound(what)) => assert_eq!(what, "stock for product 7"),
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(service.cart(1).unwrap().items.is_empty());
    }

    #[test]
    fn add_without_size_fails_when_sold_out() {
        let (store, service) = setup();
        store.stock(mug(), 0).unwrap();
        let err = service.add_without_size(1, MUG).unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock(_)));
        assert_eq!(store.available(&mug()), Some(0));
        assert!(line(&service, 1, &mug()).is_none());
    }

    #[test]
    fn second_add_of_same_variant_is_rejected_without_touching_stock() {
        let (store, service) = setup();
        service.add_with_size(1, BOOTS, "47").unwrap();
        let err = service.add_with_size(1, BOOTS, "47").unwrap_err();
        assert!(matches!(err, DomainError::AlreadyInCart(_)));
        assert_eq!(store.available(&boots("47")), Some(4));
    }

    #[test]
    fn unknown_product_and_size_are_not_found() {
        let (_store, service) = setup();
        assert!(matches!(
            service.add_with_size(1, 999, "48"),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.add_with_size(1, BOOTS, "50"),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.list_choosable_sizes(1, 999),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn choosable_sizes_skip_sold_out_and_held_sizes() {
        let (_store, service) = setup();
        assert_eq!(service.list_choosable_sizes(1, BOOTS).unwrap(), vec!["47", "48"]);

        service.add_with_size(1, BOOTS, "48").unwrap();
        assert_eq!(service.list_choosable_sizes(1, BOOTS).unwrap(), vec!["47"]);
        assert_eq!(service.list_choosable_sizes(2, BOOTS).unwrap(), vec!["47", "48"]);
    }

    #[test]
    fn remove_undoes_add() {
        let (store, service) = setup();
        service.add_with_size(1, BOOTS, "48").unwrap();
        service.increase(1, BOOTS, Size::sized("48")).unwrap();
        assert_eq!(store.available(&boots("48")), Some(0));

        service.remove(1, BOOTS, Size::sized("48")).unwrap();
        assert_eq!(store.available(&boots("48")), Some(2));
        assert!(line(&service, 1, &boots("48")).is_none());
    }

    #[test]
    fn remove_of_missing_line_is_not_found() {
        let (store, service) = setup();
        let err = service.remove(1, MUG, Size::Unsized).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(store.available(&mug()), Some(3));
    }

    #[test]
    fn increase_is_a_no_op_when_sold_out() {
        let (store, service) = setup();
        service.add_with_size(1, BOOTS, "48").unwrap();
        service.add_with_size(2, BOOTS, "48").unwrap();
        assert_eq!(store.available(&boots("48")), Some(0));

        let unchanged = service.increase(1, BOOTS, Size::sized("48")).unwrap();
        assert_eq!(unchanged.reserved, 1);
        assert_eq!(store.available(&boots("48")), Some(0));
    }

    #[test]
    fn increase_and_reduce_move_single_units() {
        let (store, service) = setup();
        service.add_without_size(1, MUG).unwrap();
        assert_eq!(service.increase(1, MUG, Size::Unsized).unwrap().reserved, 2);
        assert_eq!(store.available(&mug()), Some(1));
        assert_eq!(service.reduce(1, MUG, Size::Unsized).unwrap().reserved, 1);
        assert_eq!(store.available(&mug()), Some(2));
    }

    #[test]
    fn reduce_never_removes_the_last_unit() {
        let (store, service) = setup();
        service.add_without_size(1, MUG).unwrap();
        let kept = service.reduce(1, MUG, Size::Unsized).unwrap();
        assert_eq!(kept.reserved, 1);
        assert_eq!(store.available(&mug()), Some(2));
        assert!(line(&service, 1, &mug()).is_some());
    }

    #[test]
    fn increase_and_reduce_require_a_line() {
        let (_store, service) = setup();
        assert!(matches!(
            service.increase(1, MUG, Size::Unsized),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.reduce(1, MUG, Size::Unsized),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn cart_totals_follow_reservations() {
        let (_store, service) = setup();
        service.add_without_size(1, MUG).unwrap();
        service.increase(1, MUG, Size::Unsized).unwrap();
        service.add_with_size(1, BOOTS, "47").unwrap();

        let cart = service.cart(1).unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_quantity, 3);
        assert_eq!(cart.total_price, BigDecimal::from_str("135.00").unwrap());
    }

    #[test]
    fn last_units_go_to_the_first_two_shoppers() {
        let (store, service) = setup();
        service.add_with_size(1, BOOTS, "48").unwrap();
        assert_eq!(store.available(&boots("48")), Some(1));
        service.add_with_size(2, BOOTS, "48").unwrap();
        assert_eq!(store.available(&boots("48")), Some(0));

        let err = service.add_with_size(3, BOOTS, "48").unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock(_)));
        assert_eq!(store.available(&boots("48")), Some(0));
    }

    #[test]
    fn concurrent_adds_on_last_unit_have_one_winner() {
        let (store, service) = setup();
        store.stock(boots("48"), 1).unwrap();
        let service = Arc::new(service);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [1_i64, 2]
            .into_iter()
            .map(|user_id| {
                let service = service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    service.add_with_size(user_id, BOOTS, "48")
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(DomainError::OutOfStock(_))))
                .count(),
            1
        );
        assert_eq!(store.available(&boots("48")), Some(0));
    }

    #[test]
    fn stock_is_conserved_under_concurrent_churn() {
        let (store, service) = setup();
        let service = Arc::new(service);
        let users: Vec<i64> = (1..=8).collect();
        let key = boots("47");

        let handles: Vec<_> = users
            .iter()
            .map(|&user_id| {
                let service = service.clone();
                thread::spawn(move || {
                    for round in 0..25 {
                        let size = Size::sized("47");
                        let _ = service.add_with_size(user_id, BOOTS, "47");
                        let _ = service.increase(user_id, BOOTS, size.clone());
                        if round % 3 == 0 {
                            let _ = service.reduce(user_id, BOOTS, size.clone());
                        }
                        if round % 5 == 0 {
                            let _ = service.remove(user_id, BOOTS, size);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let available = store.available(&key).unwrap();
        assert!(available >= 0);
        assert_eq!(available + reserved_total(&service, &users, &key), 5);
    }
}
