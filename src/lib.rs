pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

pub use errors::ClientError;
pub use services::lifecycle::BookingLifecycle;
pub use services::queries::LaborClient;
