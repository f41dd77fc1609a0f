//! Runtime-domain modules: operator contract, key partitioning, the task loop
//! and the thread-per-subtask runner.

pub mod operator;
pub mod partitioner;
pub mod runner;
pub mod task;

pub use operator::*;
pub use partitioner::*;
pub use runner::*;
pub use task::*;
