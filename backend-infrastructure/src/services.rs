pub mod notifier_service;
pub mod outbox_relay;

pub use notifier_service::*;
pub use outbox_relay::*;
