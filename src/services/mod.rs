//! Services module for external integrations: balance sources and price
//! sources.

pub mod balances;
pub mod prices;

pub use balances::BalanceSource;
pub use prices::{PriceResolver, PriceSource};
