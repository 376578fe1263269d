//! Connection lifecycle management.
//!
//! Owns the per-tenant connection records and the authenticated clients
//! built for them. Backend specifics are injected through the strategy
//! traits.

mod error;
mod manager;
mod traits;
mod types;

pub use error::ConnectionError;
pub use manager::{ConnectionManager, DEFAULT_CONNECTION_EXPIRY};
pub use traits::{ClientFactory, ConnectionLoader, HealthChecker, NamespaceLoader};
pub use types::{Connection, ConnectionStatus, ConnectionStatusCode};
