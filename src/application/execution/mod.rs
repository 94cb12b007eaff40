mod gateway;

pub use gateway::{ExecutionEvent, ExecutionGateway, PendingOrder};
