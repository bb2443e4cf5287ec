//! Wallet balance fetching.
//!
//! This crate provides:
//! - The [`TokenBalanceSource`] abstraction with a Solana JSON-RPC
//!   implementation and in-memory sources for tests and simulation
//! - [`RetryingFetcher`], which builds a portfolio snapshot in rate-limited
//!   batches with exponential backoff
//! - Scan-mode token filtering
//! - Jupiter USD price lookups

pub mod error;
pub mod fetcher;
pub mod filter;
pub mod mock;
pub mod price;
pub mod retry;
pub mod solana;
pub mod source;

pub use error::*;
pub use fetcher::*;
pub use filter::*;
pub use mock::*;
pub use price::*;
pub use retry::*;
pub use solana::*;
pub use source::*;
