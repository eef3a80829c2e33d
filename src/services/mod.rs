//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! Storage sits behind traits so the logic can be exercised without a database.

pub mod api_key_service;
pub mod credential_store;
pub mod secret_protection;
pub mod tenant_service;

#[cfg(test)]
pub mod testing;
