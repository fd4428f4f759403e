pub mod checkout_service;
pub mod reservation_service;
