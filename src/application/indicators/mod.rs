pub mod engine;

pub use engine::{compute, compute_multi_timeframe, IndicatorParams};
