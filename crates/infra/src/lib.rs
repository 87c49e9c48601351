//! Infrastructure layer: identity provider, database, role cache, config,
//! and the identity orchestration built on top of them.

pub mod config;
pub mod identity;
pub mod provider;
pub mod role_cache;
pub mod store;


pub use identity::{IdentityError, IdentityOrchestrator, IdentityService, RegisterRequest};
pub use role_cache::{Lifecycle, RoleCache, RoleCacheError, RoleCacheHandle, RoleCatalog};
