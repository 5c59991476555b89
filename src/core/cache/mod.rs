mod store;

pub use store::{CacheEntry, CacheStore};
