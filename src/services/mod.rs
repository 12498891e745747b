pub mod actor;
pub mod filters;
pub mod health;
pub mod lifecycle;
pub mod queries;
pub mod query_cache;
pub mod retry;
pub mod session;
