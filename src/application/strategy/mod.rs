mod context;
mod hybrid;
mod llm_only;
mod order_book;
mod synthesizer;
mod wave_surfing;

pub use context::SynthesisContext;
pub use synthesizer::{Signal, StrategyEngine, StrategyMode, Synthesizer};
