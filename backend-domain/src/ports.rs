// Ports: what the domain needs from storage and external services

pub mod repositories;
pub mod services;

pub use repositories::*;
pub use services::*;
