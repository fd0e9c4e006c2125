//! Yahoo Finance chart API client for downloading daily OHLC history
//! No API key needed for the public chart endpoint.

mod client;
mod types;

pub use client::{ClientConfig, YahooClient};
pub use types::*;
