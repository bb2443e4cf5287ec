//! Core data types for the wallet monitor.

pub mod alert;
pub mod change;
pub mod connection;
pub mod format;
pub mod snapshot;

pub use alert::*;
pub use change::*;
pub use connection::*;
pub use format::*;
pub use snapshot::*;
