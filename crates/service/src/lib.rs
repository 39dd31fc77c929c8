//! Service layer for the override sync proxy.
//! - Owns the error taxonomy shared by every handler.
//! - Implements the two interchangeable override-store strategies behind one trait.
//! - Hosts the market-data pass-through client.

pub mod errors;
pub mod overrides;
pub mod quotes;
