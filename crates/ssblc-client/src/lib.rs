pub mod browser_pool;
pub mod server;

pub use browser_pool::{BrowserPool, PoolConfig};
pub use server::StaticServer;
