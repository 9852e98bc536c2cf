// Application commands

pub mod checkin_commands;
pub mod payment_commands;
pub mod ticket_commands;
pub mod webhook_commands;
