pub mod batching;
pub mod period;
