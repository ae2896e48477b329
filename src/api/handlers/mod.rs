//! API Handlers for the Lottery Backend

pub mod market;
pub mod purchase;
pub mod result;
pub mod ticket;
