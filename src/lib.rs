pub mod allocator;
pub mod capacity;
pub mod config;
pub mod dedup;
pub mod error;
pub mod lock;
pub mod log;
pub mod pool;
pub mod predicate;
pub mod store;
pub mod trigger;
pub mod types;
