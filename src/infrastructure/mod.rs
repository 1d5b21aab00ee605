//! Adapters implementing the domain ports.

pub mod clock;
pub mod http_gateway;
pub mod in_memory;
