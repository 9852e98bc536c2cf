pub mod checkin_handlers;
pub mod ops_handlers;
pub mod payment_handlers;
pub mod ticket_handlers;

pub use checkin_handlers::*;
pub use ops_handlers::*;
pub use payment_handlers::*;
pub use ticket_handlers::*;
