use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// The size component of a variant.
///
/// Products sold in one form only carry a single `Unsized` variant; everything
/// else is stocked per `Sized` label ("48", "XL", ...). Storage maps `Unsized`
/// to `NULL` and never to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Size {
    Unsized,
    Sized(String),
}

impl Size {
    pub fn sized(label: impl Into<String>) -> Self {
        Size::Sized(label.into())
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Size::Unsized => None,
            Size::Sized(label) => Some(label),
        }
    }

    pub fn is_sized(&self) -> bool {
        matches!(self, Size::Sized(_))
    }
}

/// Blank labels coming from the request layer collapse to `Unsized`.
impl From<Option<String>> for Size {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(label) if !label.trim().is_empty() => Size::Sized(label.trim().to_string()),
            _ => Size::Unsized,
        }
    }
}

impl From<Size> for Option<String> {
    fn from(size: Size) -> Self {
        match size {
            Size::Unsized => None,
            Size::Sized(label) => Some(label),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Unsized => f.write_str("unsized"),
            Size::Sized(label) => write!(f, "size {label}"),
        }
    }
}

/// Identifies one stock counter: a product in a particular size (or none).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub product_id: i64,
    pub size: Size,
}

impl VariantKey {
    pub fn new(product_id: i64, size: Size) -> Self {
        Self { product_id, size }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product {} ({})", self.product_id, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub key: VariantKey,
    pub available: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub price: BigDecimal,
}
