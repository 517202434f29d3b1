//! Domain layer: transaction value types, the backend/provider/cache ports,
//! and the wizard step machine.

pub mod ports;
pub mod provider;
pub mod steps;
pub mod transaction;
