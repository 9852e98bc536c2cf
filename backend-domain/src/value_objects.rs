// Domain value objects
pub mod identifiers;
pub mod provider;
pub mod statuses;

pub use identifiers::*;
pub use provider::*;
pub use statuses::*;
