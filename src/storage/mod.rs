pub mod cached;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{LinkStore, StoreError, StoreResult};
