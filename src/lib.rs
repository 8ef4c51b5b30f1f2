// Library for tests to access modules

pub mod config;
pub mod counters;
pub mod cycle;
pub mod error;
pub mod models;
pub mod readers;
pub mod scheduler;
pub mod store;
