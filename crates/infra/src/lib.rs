//! Infrastructure shared by the subsystems: data-store connections and
//! storage helpers.

pub mod postgres;
pub mod store;
pub mod table;

pub use store::{Backend, DataStore, DatabaseSettings, StoreError};
pub use table::MemoryTable;
