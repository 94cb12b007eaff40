pub mod analyzer;

pub use analyzer::{OrderBookAnalyzer, OrderBookParams};
