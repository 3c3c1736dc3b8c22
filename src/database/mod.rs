#[cfg(test)]
pub(crate) mod faulty;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{is_alive, CounterBump, Insert, OnConflict, Row, Store, Transaction};
