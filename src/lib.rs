//! MERCURY: Aptos NFT marketplace sniper.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod engine;
pub mod marketplaces;
pub mod storage;
pub mod types;
pub mod wallet;
