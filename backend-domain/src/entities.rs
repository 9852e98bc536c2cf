// Domain entities
pub mod checkin;
pub mod checkout;
pub mod config;
pub mod order;
pub mod outbox_message;
pub mod payment;
pub mod payment_event;
pub mod ticket;
pub mod validation_record;

pub use checkin::*;
pub use checkout::*;
pub use config::*;
pub use order::*;
pub use outbox_message::*;
pub use payment::*;
pub use payment_event::*;
pub use ticket::*;
pub use validation_record::*;
