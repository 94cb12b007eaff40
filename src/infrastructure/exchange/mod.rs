mod client;
mod mock;

pub use client::ExchangeClient;
pub use mock::{synthetic_candles, MockExchange};
