pub mod cart;
pub mod errors;
pub mod order;
pub mod outbox;
pub mod ports;
pub mod variant;
