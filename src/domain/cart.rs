use bigdecimal::BigDecimal;

use super::variant::{Size, VariantKey};

/// A user's live reservation on one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub user_id: i64,
    pub product_id: i64,
    pub size: Size,
    pub reserved: i32,
}

impl CartLine {
    pub fn variant(&self) -> VariantKey {
        VariantKey::new(self.product_id, self.size.clone())
    }
}

/// A cart line joined with the catalog data needed to price it.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub line: CartLine,
    pub product_name: String,
    pub unit_price: BigDecimal,
}

impl CartItem {
    pub fn subtotal(&self) -> BigDecimal {
        self.unit_price.clone() * BigDecimal::from(self.line.reserved)
    }
}

#[derive(Debug, Clone)]
pub struct CartSummary {
    pub user_id: i64,
    pub items: Vec<CartItem>,
    pub total_price: BigDecimal,
    pub total_quantity: i64,
}

impl CartSummary {
    pub fn new(user_id: i64, items: Vec<CartItem>) -> Self {
        let total_price = total_price(&items);
        let total_quantity = total_quantity(items.iter().map(|i| &i.line));
        Self {
            user_id,
            items,
            total_price,
            total_quantity,
        }
    }
}

pub fn total_price(items: &[CartItem]) -> BigDecimal {
    items
        .iter()
        .fold(BigDecimal::from(0), |acc, item| acc + item.subtotal())
}

pub fn total_quantity<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> i64 {
    lines.into_iter().map(|l| i64::from(l.reserved)).sum()
}
