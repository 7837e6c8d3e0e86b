// Bounded-concurrency task execution
pub mod worker_pool;
