//! Core library for the arbitrage-agent project.
//!
//! Buys an asset on Bitstamp and sells it on VALR when the two order
//! books, translated through a per-account exchange rate, leave enough
//! margin. The binary (`main.rs`) runs one cycle per configured account.

pub mod aggregator;
pub mod arbitrage;
pub mod cex;
pub mod cli;
pub mod config;
pub mod errors;
pub mod market;
pub mod models;
pub mod utils;
