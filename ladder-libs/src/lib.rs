pub mod types;
pub mod error;
pub mod config;
pub mod reader;
pub mod entry_row;
pub mod totals;
pub mod rank;
pub mod shifter;
pub mod store;
pub mod memory;
pub mod statistic;
pub mod coordinator;
pub mod reset;
pub mod view;
pub mod snapshot;
pub mod worker;
