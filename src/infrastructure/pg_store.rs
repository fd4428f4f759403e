use std::time::{Duration, Instant};

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::cart::CartLine;
use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, OrderLineInput, OrderLineView, OrderStatus, OrderView};
use crate::domain::outbox::OutboxEvent;
use crate::domain::ports::{CartStore, Catalog, InventoryStore, OrderStore, Store, TxBody};
use crate::domain::variant::{Product, Size, Variant, VariantKey};
use crate::schema::{cart_lines, order_lines, order_outbox, orders, products, variants};

use super::models::{
    CartLineRow, NewCartLineRow, NewOrderLineRow, NewOrderRow, NewOutboxEventRow, NewProductRow,
    NewVariantRow, OrderLineRow, OrderRow, ProductRow, VariantRow,
};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<DieselError> for DomainError {
    fn from(e: DieselError) -> Self {
        match &e {
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                DomainError::TransactionAborted(e.to_string())
            }
            // statement_timeout / lock_timeout (57014, 55P03) and deadlocks (40P01)
            DieselError::DatabaseError(_, info)
                if info.message().starts_with("canceling statement due to")
                    || info.message().starts_with("deadlock detected") =>
            {
                DomainError::TransactionAborted(e.to_string())
            }
            _ => DomainError::Internal(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// PostgreSQL-backed store.
///
/// Stock is decremented with a single conditional `UPDATE`, so the row lock
/// Postgres takes for it serializes concurrent reservations of one variant.
/// Cart lines are read `FOR UPDATE` before they are changed; read-only views
/// take no locks.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn add_product(&self, name: &str, slug: &str, price: BigDecimal) -> Result<i64, DomainError> {
        let mut conn = self.pool.get()?;
        let id = diesel::insert_into(products::table)
            .values(&NewProductRow { name, slug, price })
            .returning(products::id)
            .get_result(&mut conn)?;
        Ok(id)
    }

    /// Creates the variant, or resets its counter if it already exists.
    pub fn stock(&self, key: &VariantKey, available: i32) -> Result<(), DomainError> {
        if available < 0 {
            return Err(DomainError::InvalidInput("stock must not be negative".into()));
        }
        let mut conn = self.pool.get()?;
        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(
                variants::table
                    .filter(variants::product_id.eq(key.product_id))
                    .filter(variants::size.is_not_distinct_from(key.size.as_deref())),
            )
            .set(variants::available.eq(available))
            .execute(conn)?;
            if updated == 0 {
                diesel::insert_into(variants::table)
                    .values(&NewVariantRow {
                        product_id: key.product_id,
                        size: key.size.as_deref(),
                        available,
                    })
                    .execute(conn)?;
            }
            Ok(())
        })
    }
}

impl Store for PgStore {
    fn transaction(
        &self,
        deadline: Option<Duration>,
        body: &mut TxBody<'_>,
    ) -> Result<(), DomainError> {
        let started = Instant::now();
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            if let Some(limit) = deadline {
                let millis = limit.as_millis().max(1);
                diesel::sql_query(format!("SET LOCAL statement_timeout = {millis}")).execute(conn)?;
                diesel::sql_query(format!("SET LOCAL lock_timeout = {millis}")).execute(conn)?;
            }

            body(&mut PgTx { conn })?;

            if let Some(limit) = deadline {
                if started.elapsed() > limit {
                    return Err(DomainError::TransactionAborted(format!(
                        "deadline of {limit:?} exceeded"
                    )));
                }
            }
            Ok(())
        })
    }
}

struct PgTx<'c> {
    conn: &'c mut PgConnection,
}

fn cart_line_from_row(row: CartLineRow) -> CartLine {
    CartLine {
        user_id: row.user_id,
        product_id: row.product_id,
        size: Size::from(row.size),
        reserved: row.reserved,
    }
}

impl Catalog for PgTx<'_> {
    fn product(&mut self, product_id: i64) -> Result<Option<Product>, DomainError> {
        let row = products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(self.conn)
            .optional()?;
        Ok(row.map(|p| Product {
            id: p.id,
            name: p.name,
            slug: p.slug,
            price: p.price,
        }))
    }
}

impl InventoryStore for PgTx<'_> {
    fn variants(&mut self, product_id: i64) -> Result<Vec<Variant>, DomainError> {
        let rows = variants::table
            .filter(variants::product_id.eq(product_id))
            .order(variants::id.asc())
            .select(VariantRow::as_select())
            .load(self.conn)?;
        Ok(rows
            .into_iter()
            .map(|v| Variant {
                key: VariantKey::new(v.product_id, Size::from(v.size)),
                available: v.available,
            })
            .collect())
    }

    fn try_decrement(&mut self, key: &VariantKey, n: i32) -> Result<bool, DomainError> {
        let updated = diesel::update(
            variants::table
                .filter(variants::product_id.eq(key.product_id))
                .filter(variants::size.is_not_distinct_from(key.size.as_deref()))
                .filter(variants::available.ge(n)),
        )
        .set(variants::available.eq(variants::available - n))
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn increment(&mut self, key: &VariantKey, n: i32) -> Result<(), DomainError> {
        let updated = diesel::update(
            variants::table
                .filter(variants::product_id.eq(key.product_id))
                .filter(variants::size.is_not_distinct_from(key.size.as_deref())),
        )
        .set(variants::available.eq(variants::available + n))
        .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::not_found(format!("variant {key}")));
        }
        Ok(())
    }
}

impl CartStore for PgTx<'_> {
    fn get(&mut self, user_id: i64, key: &VariantKey) -> Result<Option<CartLine>, DomainError> {
        let row = cart_lines::table
            .filter(cart_lines::user_id.eq(user_id))
            .filter(cart_lines::product_id.eq(key.product_id))
            .filter(cart_lines::size.is_not_distinct_from(key.size.as_deref()))
            .select(CartLineRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()?;
        Ok(row.map(cart_line_from_row))
    }

    fn create(
        &mut self,
        user_id: i64,
        key: &VariantKey,
        reserved: i32,
    ) -> Result<CartLine, DomainError> {
        let inserted = diesel::insert_into(cart_lines::table)
            .values(&NewCartLineRow {
                user_id,
                product_id: key.product_id,
                size: key.size.as_deref(),
                reserved,
            })
            .returning(CartLineRow::as_returning())
            .get_result(self.conn);
        match inserted {
            Ok(row) => Ok(cart_line_from_row(row)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(DomainError::AlreadyInCart(key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_quantity(&mut self, line: &CartLine, reserved: i32) -> Result<CartLine, DomainError> {
        let updated = diesel::update(
            cart_lines::table
                .filter(cart_lines::user_id.eq(line.user_id))
                .filter(cart_lines::product_id.eq(line.product_id))
                .filter(cart_lines::size.is_not_distinct_from(line.size.as_deref())),
        )
        .set(cart_lines::reserved.eq(reserved))
        .execute(self.conn)?;
        if updated == 0 {
            return Err(DomainError::not_found(format!("cart line for {}", line.variant())));
        }
        Ok(CartLine {
            reserved,
            ..line.clone()
        })
    }

    fn delete(&mut self, line: &CartLine) -> Result<(), DomainError> {
        let deleted = diesel::delete(
            cart_lines::table
                .filter(cart_lines::user_id.eq(line.user_id))
                .filter(cart_lines::product_id.eq(line.product_id))
                .filter(cart_lines::size.is_not_distinct_from(line.size.as_deref())),
        )
        .execute(self.conn)?;
        if deleted == 0 {
            return Err(DomainError::not_found(format!("cart line for {}", line.variant())));
        }
        Ok(())
    }

    fn list_by_user(&mut self, user_id: i64) -> Result<Vec<CartLine>, DomainError> {
        let rows = cart_lines::table
            .filter(cart_lines::user_id.eq(user_id))
            .order(cart_lines::id.asc())
            .select(CartLineRow::as_select())
            .load(self.conn)?;
        Ok(rows.into_iter().map(cart_line_from_row).collect())
    }

    fn lock_by_user(&mut self, user_id: i64) -> Result<Vec<CartLine>, DomainError> {
        let rows = cart_lines::table
            .filter(cart_lines::user_id.eq(user_id))
            .order(cart_lines::id.asc())
            .select(CartLineRow::as_select())
            .for_update()
            .load(self.conn)?;
        Ok(rows.into_iter().map(cart_line_from_row).collect())
    }
}

impl OrderStore for PgTx<'_> {
    fn insert_order(&mut self, order: &NewOrder) -> Result<(), DomainError> {
        diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                id: order.id,
                user_id: order.user_id,
                surname: &order.form.surname,
                name: &order.form.name,
                middle_name: &order.form.middle_name,
                address: &order.form.address,
                phone_number: &order.form.phone_number,
                status: order.status.as_str(),
            })
            .execute(self.conn)?;
        Ok(())
    }

    fn insert_order_line(
        &mut self,
        order_id: Uuid,
        line: &OrderLineInput,
    ) -> Result<Uuid, DomainError> {
        let id = Uuid::new_v4();
        let inserted = diesel::insert_into(order_lines::table)
            .values(&NewOrderLineRow {
                id,
                order_id,
                position: line.position,
                product_id: line.product_id,
                size: line.size.as_deref(),
                quantity: line.quantity,
                unit_price: line.unit_price.clone(),
            })
            .execute(self.conn);
        match inserted {
            Ok(_) => Ok(id),
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info)) => Err(
                DomainError::not_found(format!("order line reference: {}", info.message())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let order = orders::table
            .filter(orders::id.eq(order_id))
            .select(OrderRow::as_select())
            .first(self.conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let lines = OrderLineRow::belonging_to(&order)
            .order(order_lines::position.asc())
            .select(OrderLineRow::as_select())
            .load(self.conn)?;

        Ok(Some(OrderView {
            id: order.id,
            user_id: order.user_id,
            status: OrderStatus::parse(&order.status)?,
            surname: order.surname,
            name: order.name,
            middle_name: order.middle_name,
            address: order.address,
            phone_number: order.phone_number,
            created_at: order.created_at,
            lines: lines
                .into_iter()
                .map(|l| OrderLineView {
                    id: l.id,
                    product_id: l.product_id,
                    size: Size::from(l.size),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
        }))
    }

    fn transition_order(
        &mut self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError> {
        // After waiting on a concurrent writer, Postgres re-evaluates the
        // status filter against the committed row.
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(from.as_str())),
        )
        .set((orders::status.eq(to.as_str()), orders::updated_at.eq(Utc::now())))
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn append_outbox(&mut self, event: &OutboxEvent) -> Result<(), DomainError> {
        diesel::insert_into(order_outbox::table)
            .values(&NewOutboxEventRow {
                id: event.id,
                aggregate_type: &event.aggregate_type,
                aggregate_id: &event.aggregate_id,
                event_type: &event.event_type,
                payload: event.payload.clone(),
            })
            .execute(self.conn)?;
        Ok(())
    }
}
