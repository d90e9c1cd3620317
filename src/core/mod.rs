pub mod data_store;
pub mod processor;
pub mod progress;
pub mod stats;
