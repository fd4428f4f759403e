use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{DomainError, FieldError};
use super::variant::Size;

const NAME_MAX_CHARS: usize = 50;
const ADDRESS_MAX_CHARS: usize = 100;
const PHONE_MAX_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    InTransit,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "IN_TRANSIT" => Ok(OrderStatus::InTransit),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            other => Err(DomainError::Internal(format!("unknown order status '{other}'"))),
        }
    }
}

/// Delivery and contact details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutForm {
    pub surname: String,
    pub name: String,
    pub middle_name: String,
    pub address: String,
    pub phone_number: String,
}

impl CheckoutForm {
    /// The form with surrounding whitespace stripped from every field.
    pub fn cleaned(self) -> Self {
        Self {
            surname: self.surname.trim().to_string(),
            name: self.name.trim().to_string(),
            middle_name: self.middle_name.trim().to_string(),
            address: self.address.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
        }
    }

    /// Checks every field and reports all failures at once. Surrounding
    /// whitespace is ignored.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("surname", &self.surname),
            ("name", &self.name),
            ("middle_name", &self.middle_name),
        ] {
            if let Some(message) = check_person_name(value) {
                errors.push(FieldError::new(field, message));
            }
        }

        let address = self.address.trim();
        if address.is_empty() {
            errors.push(FieldError::new("address", "must not be empty"));
        } else if address.chars().count() > ADDRESS_MAX_CHARS {
            errors.push(FieldError::new(
                "address",
                format!("must be at most {ADDRESS_MAX_CHARS} characters"),
            ));
        }

        if !is_valid_phone_number(self.phone_number.trim()) {
            errors.push(FieldError::new("phone_number", "invalid phone number"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

fn check_person_name(value: &str) -> Option<String> {
    let value = value.trim();
    if value.chars().count() > NAME_MAX_CHARS {
        return Some(format!("must be at most {NAME_MAX_CHARS} characters"));
    }
    let letters: Vec<char> = value.chars().filter(|c| *c != '-').collect();
    if letters.is_empty() || !letters.iter().all(|c| c.is_alphabetic()) {
        return Some("must contain only letters and hyphens".to_string());
    }
    None
}

/// International numbers only: without a region the `+` country prefix is
/// required, and the number must exist in that country's numbering plan.
fn is_valid_phone_number(value: &str) -> bool {
    value.chars().count() <= PHONE_MAX_CHARS
        && phonenumber::parse(None, value).is_ok_and(|number| phonenumber::is_valid(&number))
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: i64,
    pub form: CheckoutForm,
    pub status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct OrderLineInput {
    /// Position of the line within its order, starting at 0.
    pub position: i32,
    pub product_id: i64,
    pub size: Size,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: i64,
    pub size: Size,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: i64,
    pub surname: String,
    pub name: String,
    pub middle_name: String,
    pub address: String,
    pub phone_number: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    pub fn total_price(&self) -> BigDecimal {
        self.lines.iter().fold(BigDecimal::from(0), |acc, l| {
            acc + l.unit_price.clone() * BigDecimal::from(l.quantity)
        })
    }
}
