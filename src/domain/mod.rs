pub mod balance;
pub mod decision;
pub mod errors;
pub mod orderbook;
pub mod ports;
pub mod position;
pub mod regime;
pub mod signal;
pub mod types;
