pub mod memory_store;
pub mod models;
pub mod pg_store;
