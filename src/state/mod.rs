// Storage and in-process state

pub mod config_store;
pub mod registration_store;
pub mod session_cache;

pub use config_store::{InMemoryConfigStore, PgConfigStore};
pub use registration_store::{InMemoryRegistrationStore, PgRegistrationStore};
pub use session_cache::SessionCache;
