// Application queries

pub mod order_queries;
pub mod ticket_queries;
pub mod validation_queries;
