pub mod redis_manager;
pub mod redis_store;
pub mod store;

pub use redis_manager::RedisManager;
pub use redis_store::RedisStore;
pub use store::{MemoryStore, Store};
