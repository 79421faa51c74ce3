pub mod gateway;
pub mod memory;
pub mod record;
pub mod sqlite;
pub mod watchlist;

pub use gateway::{CacheGateway, CachePolicy};
pub use memory::MemoryRecordStore;
pub use record::{Collection, Record, RecordStore};
pub use sqlite::SqliteRecordStore;
pub use watchlist::{WatchlistEntry, WatchlistStore};
