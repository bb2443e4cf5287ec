//! Wallet change-detection engine.
//!
//! This crate contains the snapshot diff, the connection health state
//! machine, snapshot persistence and the scan loop tying them together.

pub mod diff;
pub mod health;
pub mod monitor;
pub mod store;

pub use diff::*;
pub use health::*;
pub use monitor::*;
pub use store::*;
