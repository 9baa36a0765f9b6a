//! Database models and queries

pub mod init;
pub mod leads;
pub mod models;
pub mod tenants;
pub mod thresholds;

pub use init::*;
pub use models::*;
