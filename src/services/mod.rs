//! Business logic services

pub mod ledger;
pub mod locks;
pub mod results;
pub mod tickets;
