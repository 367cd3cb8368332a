pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod hooks;
pub mod protocol;
pub mod scheduler;
pub mod shutdown;
pub mod worker;
