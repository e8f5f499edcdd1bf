//! litaudit - screening decision audit for reference libraries
//!
//! Records systematic-review decisions against a versioned bibliographic
//! store and keeps them auditable: decisions live in audit notes on each
//! item, fast-lookup tags mirror them, and version-checked writes keep
//! concurrent screening sessions from overwriting each other.

pub mod audit;
pub mod config;
pub mod gateway;
pub mod ledger;
pub mod maintenance;
pub mod screening;
pub mod transport;
