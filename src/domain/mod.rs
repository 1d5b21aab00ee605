//! Domain types for payment orders and the ports the application talks through.

pub mod intent;
pub mod order;
pub mod ports;
pub mod status;
