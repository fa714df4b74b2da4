pub mod connection;
pub mod transaction;

pub use connection::{create_pool, create_pool_with_config, DbPool, PoolConfig};
pub use transaction::TimedTransaction;

/// Request context carrying a PostgreSQL transaction.
pub type DbContext = crate::transaction::RequestContext<TimedTransaction>;
