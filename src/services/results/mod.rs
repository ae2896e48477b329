//! Result Declaration and Settlement
//!
//! Declares the five prize tiers for a market and settles winning
//! purchases against the balance ledger.

mod declare;
mod settle;
mod types;

pub use declare::ResultDeclarationService;
pub use types::*;
