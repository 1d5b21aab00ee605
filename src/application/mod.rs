//! Application layer containing the payment order orchestration.
//!
//! This module defines the `OrderService`, the single implementation of order
//! creation and verification shared by every request adapter. It talks to the
//! gateway only through the `GatewayClient` port and keeps no state between
//! calls.

pub mod orders;
